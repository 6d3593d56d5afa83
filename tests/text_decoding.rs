//! Charset determination against a live HTTP server: header charsets,
//! default encodings, byte-order marks and in-document declarations.

mod support;
use support::socket_guard::start_mock_server_or_skip;
use support::{capture_info, macroman};

use std::sync::{Arc, Mutex};

use by_request::{Client, FetchOptions};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COTE: &str = "C\u{f4}te d'Ivoire";
const HELLO: &str = "Hello, world! \u{1F642}";
const MOOSE: &str = "A M\u{f8}\u{f8}se once bit my sister... No realli!";

async fn serve(server: &MockServer, route: &str, content_type: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", content_type)
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

fn utf16(text: &str, big_endian: bool, bom: bool) -> Vec<u8> {
    let text = if bom { format!("\u{FEFF}{text}") } else { text.to_string() };
    text.encode_utf16()
        .flat_map(|unit| {
            if big_endian {
                unit.to_be_bytes()
            } else {
                unit.to_le_bytes()
            }
        })
        .collect()
}

/// The embedded-declaration page, with the declaration chosen by `id` and a
/// decoy UTF-8 declaration inside a comment.
fn macroman_page(id: u8) -> Vec<u8> {
    let page = format!(
        "{}\n<!-- Ignore this <meta charset=\"utf-8\"> -->\n{}\n{}\n{}\n<div>{MOOSE}</div>",
        if id == 1 { "<?xml version=\"1.0\" encoding=\"macroman\"?>" } else { "" },
        if id == 2 { "<meta charset=\"macroman\">" } else { "" },
        if id == 3 {
            "<meta http-equiv=\"Content-Type\" content=\"text/html; charset=macroman\">"
        } else {
            ""
        },
        if id == 4 { "@charset \"macroman\";" } else { "" },
    );
    macroman(&page)
}

#[tokio::test]
async fn test_utf8_text_is_read_correctly() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve(&server, "/test1", "text/html; charset=utf-8", COTE.as_bytes().to_vec()).await;

    let text = Client::new()
        .fetch_text(format!("{}/test1", server.uri()), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(text, COTE);
}

#[tokio::test]
async fn test_latin1_header_charset() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let body: Vec<u8> = COTE.chars().map(|c| c as u8).collect();
    serve(&server, "/test2", "text/plain; charset=iso-8859-1", body).await;
    let (info, options) = capture_info();

    let text = Client::new()
        .fetch_text(format!("{}/test2", server.uri()), &options)
        .await
        .unwrap();

    assert_eq!(text, COTE);
    let info = info.lock().unwrap().clone().unwrap();
    assert_eq!(info.charset, "iso-8859-1");
    assert!(!info.bom_detected);
}

#[tokio::test]
async fn test_utf16le_with_bom() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve(&server, "/test3", "text/plain; charset=utf-16le", utf16(HELLO, false, true)).await;
    let (info, options) = capture_info();

    let text = Client::new()
        .fetch_text(format!("{}/test3", server.uri()), &options)
        .await
        .unwrap();

    assert_eq!(text, HELLO);
    let info = info.lock().unwrap().clone().unwrap();
    assert!(info.bom_detected);
    assert!(info.bom_removed);
}

#[tokio::test]
async fn test_unlabelled_utf16_with_default_encoding() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve(&server, "/test4", "text/plain", utf16(HELLO, true, false)).await;

    let text = Client::new()
        .fetch_text(
            format!("{}/test4", server.uri()),
            &FetchOptions::default().with_encoding("utf-16"),
        )
        .await
        .unwrap();

    assert_eq!(text, HELLO);
}

#[tokio::test]
async fn test_wrong_default_encoding_garbles_text() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve(&server, "/test5", "text/plain", COTE.as_bytes().to_vec()).await;

    let text = Client::new()
        .fetch_text(
            format!("{}/test5", server.uri()),
            &FetchOptions::default().with_encoding("iso-8859-1"),
        )
        .await
        .unwrap();

    assert_eq!(text, "C\u{c3}\u{b4}te d'Ivoire");
}

#[tokio::test]
async fn test_utf8_bom_overrides_header_charset() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut body = vec![0xEF, 0xBB, 0xBF];
    body.extend_from_slice(COTE.as_bytes());
    serve(&server, "/test6", "text/plain; charset=iso-8859-1", body).await;
    let (info, options) = capture_info();

    let text = Client::new()
        .fetch_text(format!("{}/test6", server.uri()), &options)
        .await
        .unwrap();

    assert_eq!(text, COTE);
    assert_eq!(info.lock().unwrap().as_ref().unwrap().charset, "utf-8");
}

#[tokio::test]
async fn test_embedded_declarations_select_macroman() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    for id in 1..=4 {
        serve(&server, &format!("/test7/{id}"), "text/html", macroman_page(id)).await;
    }
    let client = Client::new();

    for id in 1..=4 {
        let text = client
            .fetch_text(format!("{}/test7/{id}", server.uri()), &FetchOptions::default())
            .await
            .unwrap();
        assert!(text.contains(MOOSE), "Expected decoded text for page {id} in: {text}");
    }
}

#[tokio::test]
async fn test_commented_declaration_is_ignored() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve(&server, "/decoy", "text/html", macroman_page(0)).await;
    let (info, options) = capture_info();

    let text = Client::new()
        .fetch_text(format!("{}/decoy", server.uri()), &options.with_encoding("macroman"))
        .await
        .unwrap();

    assert!(text.contains(MOOSE), "Expected decoded text in: {text}");
    assert_eq!(info.lock().unwrap().as_ref().unwrap().charset, "macroman");
}

#[tokio::test]
async fn test_forced_encoding_beats_header() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve(&server, "/forced", "text/plain; charset=utf-8", macroman(COTE)).await;

    let text = Client::new()
        .fetch_text(
            format!("{}/forced", server.uri()),
            &FetchOptions::default()
                .with_encoding("macroman")
                .with_force_encoding(),
        )
        .await
        .unwrap();

    assert_eq!(text, COTE);
}

#[tokio::test]
async fn test_unknown_header_charset_is_unsupported() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve(&server, "/klingon", "text/plain; charset=x-klingon", b"nuqneH".to_vec()).await;

    let error = Client::new()
        .fetch_text(format!("{}/klingon", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(415));
    let msg = error.to_string();
    assert!(msg.contains("x-klingon"), "Expected charset name in: {msg}");
}

#[tokio::test]
async fn test_progress_reports_on_large_content() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut content = String::from("Very large content ");
    for i in 0..100_000_u32 {
        content.push_str(&format!("{:03}", i % 1000));
    }
    serve(&server, "/test8", "text/html; charset=utf-8", content.into_bytes()).await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let options = FetchOptions::default()
        .with_progress(move |read, total| sink.lock().unwrap().push((read, total)));

    let text = Client::new()
        .fetch_text(format!("{}/test8", server.uri()), &options)
        .await
        .unwrap();

    assert!(text.starts_with("Very large content"));
    let calls = calls.lock().unwrap();
    assert!(!calls.is_empty());
    let (read, total) = *calls.last().unwrap();
    assert_eq!(Some(read), total);
    assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0), "progress must not go backwards");
}

#[tokio::test]
async fn test_bom_is_stripped_unless_kept() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    const GREETING: &str = "Hi \u{263A} \u{1F642}";
    let marked = format!("\u{FEFF}{GREETING}");
    let utf32 = |big_endian: bool| -> Vec<u8> {
        marked
            .chars()
            .flat_map(|c| {
                let c = u32::from(c);
                if big_endian { c.to_be_bytes() } else { c.to_le_bytes() }
            })
            .collect()
    };
    let cases = [
        ("utf-8", marked.clone().into_bytes()),
        ("utf-16le", utf16(GREETING, false, true)),
        ("utf-16be", utf16(GREETING, true, true)),
        ("utf-32le", utf32(false)),
        ("utf-32be", utf32(true)),
        ("utf-7", b"+/v8-Hi +Jjo +2D3eQg-".to_vec()),
    ];
    for (charset, body) in &cases {
        serve(&server, &format!("/bom/{charset}"), "text/plain", body.clone()).await;
    }
    let client = Client::new();

    for (charset, _) in &cases {
        for keep_bom in [false, true] {
            let (info, options) = capture_info();
            let options = if keep_bom { options.with_keep_bom() } else { options };

            let text = client
                .fetch_text(format!("{}/bom/{charset}", server.uri()), &options)
                .await
                .unwrap();

            let expected = if keep_bom { marked.as_str() } else { GREETING };
            assert_eq!(text, expected, "{charset}, keep_bom={keep_bom}");
            let info = info.lock().unwrap().clone().unwrap();
            assert_eq!(info.charset, *charset);
            assert!(info.bom_detected, "{charset}");
            assert_eq!(info.bom_removed, !keep_bom, "{charset}, keep_bom={keep_bom}");
        }
    }
}
