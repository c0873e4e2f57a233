use htserve::http::request::parse;
use htserve::{ContentTypeRegistry, Method, ParseOutcome, StatusCode};

fn outcome(raw: &str) -> ParseOutcome {
    parse(raw.as_bytes(), &ContentTypeRegistry::new())
}

#[test]
fn test_valid_requests_parse_with_path_and_type() {
    let cases = [
        ("GET", "HTTP/1.1", "/about.html", "text/html", Method::Get),
        ("HEAD", "HTTP/1.1", "/app.js", "text/javascript", Method::Head),
        ("GET", "HTTP/1.0", "/data/report.json", "application/json", Method::Get),
        ("HEAD", "HTTP/1.0", "/photo.jpeg", "image/jpeg", Method::Head),
    ];

    for (method, version, url, content_type, expected_method) in cases {
        let raw = format!("{method} {url} {version}\r\nHost: example.com\r\nAccept: */*\r\n\r\n");
        let parsed = outcome(&raw);
        let req = parsed.request().unwrap_or_else(|| panic!("{raw:?} rejected"));
        assert_eq!(req.method(), expected_method);
        assert_eq!(req.target_path(), url);
        assert_eq!(req.content_type(), content_type);
    }
}

#[test]
fn test_root_request_defaults() {
    let parsed = outcome("GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
    let req = parsed.request().unwrap();
    assert_eq!(req.method(), Method::Get);
    assert_eq!(req.target_path(), "/index.html");
    assert_eq!(req.content_type(), "text/html");
    assert!(!req.is_keep_alive());
}

#[test]
fn test_missing_host_always_bad_request() {
    for raw in [
        "GET / HTTP/1.1\r\n\r\n",
        "HEAD /a.css HTTP/1.0\r\nConnection: keep-alive\r\n\r\n",
        "GET / HTTP/1.1\r\nX-Host: example.com\r\n\r\n",
        "GET / HTTP/1.1\r\nhost: example.com\r\n\r\n",
    ] {
        assert_eq!(outcome(raw).status(), StatusCode::BadRequest, "{raw:?}");
    }
}

#[test]
fn test_http_0_9_unsupported() {
    let parsed = outcome("GET /index.html HTTP/0.9\r\nHost: example.com\r\n\r\n");
    assert_eq!(parsed.status(), StatusCode::HttpVersionNotSupported);
}

#[test]
fn test_unknown_method_maps_to_bad_request() {
    // NotImplemented exists but is never produced by the parser
    let parsed = outcome("PUT /upload.txt HTTP/1.1\r\nHost: example.com\r\n\r\n");
    assert_eq!(parsed.status(), StatusCode::BadRequest);
}

#[test]
fn test_every_line_given_is_scanned() {
    // sessions pass only the head; anything after the blank line is still scanned here
    let parsed = outcome("GET /a.txt HTTP/1.1\r\nHost: h\r\n\r\nConnection: keep-alive\r\n");
    assert!(parsed.is_keep_alive());
    assert_eq!(parsed.status(), StatusCode::Ok);
}
