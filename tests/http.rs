use camino::Utf8Path;
use dbx::{endpoints::Endpoints, Dropbox, HttpTransport, StatusPolicy};
use mockito::Matcher;
use serde_json::json;

fn token_env(name: &str) -> Option<String> {
    (name == dbx::auth::ACCESS_TOKEN).then(|| "test-token".to_owned())
}

fn client(server: &mockito::Server) -> Dropbox<HttpTransport> {
    let base = url::Url::parse(&server.url()).unwrap();
    Dropbox::new(HttpTransport::new().unwrap(), Endpoints::single(base)).with_env(token_env)
}

#[test]
fn downloads_to_basename() {
    let mut server = mockito::Server::new();

    let m = server
        .mock("POST", "/2/files/download")
        .match_header("authorization", "Bearer test-token")
        .match_header("dropbox-api-arg", r#"{"path":"/some/dir/foo.txt"}"#)
        .match_header("content-type", "text/plain; charset=utf-8")
        .with_status(200)
        .with_header("dropbox-api-result", r#"{"name": "foo.txt"}"#)
        .with_body("hello")
        .create();

    let td = tempfile::tempdir().unwrap();
    let cwd = Utf8Path::from_path(td.path()).unwrap();

    let local = client(&server).download("some/dir/foo.txt", cwd).unwrap();

    m.assert();
    assert_eq!(local, cwd.join("foo.txt"));
    assert_eq!(std::fs::read(&local).unwrap(), b"hello");
}

#[test]
fn uploads_raw_bytes() {
    let mut server = mockito::Server::new();

    let m = server
        .mock("POST", "/2/files/upload")
        .match_header("authorization", "Bearer test-token")
        .match_header("content-type", "application/octet-stream")
        .match_header(
            "dropbox-api-arg",
            Matcher::JsonString(
                r#"{"path": "/Docs/report.pdf", "mode": "overwrite", "autorename": false, "mute": true}"#
                    .to_owned(),
            ),
        )
        .match_body(Matcher::Exact("%PDF-1.7 not really".to_owned()))
        .with_status(200)
        .with_body(r#"{"name": "report.pdf"}"#)
        .create();

    let td = tempfile::tempdir().unwrap();
    let local = Utf8Path::from_path(td.path()).unwrap().join("report.pdf");
    std::fs::write(&local, "%PDF-1.7 not really").unwrap();

    let mut out = Vec::new();
    client(&server).upload(&local, "Docs", &mut out).unwrap();

    m.assert();
    assert_eq!(out, br#"{"name": "report.pdf"}"#);
}

#[test]
fn moves_with_json_body() {
    let mut server = mockito::Server::new();

    let m = server
        .mock("POST", "/2/files/move_v2")
        .match_header("content-type", "application/json")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::Json(json!({
            "from_path": "/A",
            "to_path": "/B",
            "allow_shared_folder": true,
            "autorename": false,
            "allow_ownership_transfer": false,
        })))
        .with_status(200)
        .with_body(r#"{"metadata": {".tag": "file", "name": "B"}}"#)
        .create();

    let mut out = Vec::new();
    client(&server).move_v2("A", "B", &mut out).unwrap();

    m.assert();
    assert_eq!(out, br#"{"metadata": {".tag": "file", "name": "B"}}"#);
}

#[test]
fn creates_folders() {
    let mut server = mockito::Server::new();

    let m = server
        .mock("POST", "/2/files/create_folder_v2")
        .match_body(Matcher::Json(json!({"path": "/New Folder", "autorename": false})))
        .with_status(200)
        .with_body("{}")
        .create();

    client(&server)
        .create_folder_v2("New Folder", &mut Vec::new())
        .unwrap();

    m.assert();
}

const NOT_FOUND: &str = r#"{"error_summary": "path_lookup/not_found/..", "error": {".tag": "path_lookup", "path_lookup": {".tag": "not_found"}}}"#;

#[test]
fn repeated_delete_passes_errors_through() {
    let mut server = mockito::Server::new();

    let m = server
        .mock("POST", "/2/files/delete_v2")
        .match_body(Matcher::Json(json!({"path": "/gone.txt"})))
        .with_status(409)
        .with_header("content-type", "application/json")
        .with_body(NOT_FOUND)
        .expect(2)
        .create();

    let dbx = client(&server);
    let mut out = Vec::new();

    dbx.delete_v2("gone.txt", &mut out).unwrap();
    dbx.delete_v2("gone.txt", &mut out).unwrap();

    m.assert();
    assert_eq!(out, [NOT_FOUND, NOT_FOUND].concat().as_bytes());
}

#[test]
fn checked_status_surfaces_api_errors() {
    let mut server = mockito::Server::new();

    let _m = server
        .mock("POST", "/2/files/delete_v2")
        .with_status(409)
        .with_body(NOT_FOUND)
        .create();

    let dbx = client(&server).with_status_policy(StatusPolicy::Fail);
    let mut out = Vec::new();

    let err = dbx.delete_v2("gone.txt", &mut out).unwrap_err().to_string();

    assert!(err.contains("409"), "{err}");
    assert!(err.contains("path_lookup/not_found"), "{err}");
    assert!(out.is_empty());
}

#[test]
fn missing_token_sends_nothing() {
    let mut server = mockito::Server::new();

    let m = server
        .mock("POST", Matcher::Any)
        .with_status(200)
        .expect(0)
        .create();

    let dbx = client(&server).with_env(|_| None);
    let err = dbx.delete_v2("a", &mut Vec::new()).unwrap_err();

    assert!(err.to_string().contains(dbx::auth::ACCESS_TOKEN));
    m.assert();
}

#[test]
fn connection_failures_are_errors() {
    // Nothing listens on port 1
    let base = url::Url::parse("http://127.0.0.1:1").unwrap();
    let dbx = Dropbox::new(HttpTransport::new().unwrap(), Endpoints::single(base)).with_env(token_env);

    let mut out = Vec::new();
    let err = dbx.delete_v2("a", &mut out).unwrap_err();

    let msg = err.to_string();
    assert!(msg.starts_with("failed to connect"), "{err:#}");
    assert!(msg.contains("http://127.0.0.1:1/2/files/delete_v2"), "{err:#}");
    assert!(out.is_empty());
}

/// Serves exactly one connection with a canned raw response, after consuming
/// the request headers and body
fn serve_once(response: &'static [u8]) -> url::Url {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let mut req = Vec::new();
        let mut block = [0u8; 1024];
        let header_end = loop {
            let read = stream.read(&mut block).unwrap();
            assert!(read > 0, "connection closed before the request ended");
            req.extend_from_slice(&block[..read]);

            if let Some(pos) = req.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&req[..header_end]).to_lowercase();
        let body_len = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map_or(0, |v| v.trim().parse::<usize>().unwrap());

        while req.len() < header_end + body_len {
            let read = stream.read(&mut block).unwrap();
            if read == 0 {
                break;
            }
            req.extend_from_slice(&block[..read]);
        }

        stream.write_all(response).unwrap();
        stream.flush().unwrap();
    });

    url::Url::parse(&format!("http://{addr}")).unwrap()
}

#[test]
fn oversized_content_length_is_an_error() {
    let base = serve_once(
        b"HTTP/1.1 200 OK\r\ncontent-length: 4611686018427387904\r\nconnection: close\r\n\r\nok",
    );
    let dbx = Dropbox::new(HttpTransport::new().unwrap(), Endpoints::single(base)).with_env(token_env);

    let mut out = Vec::new();
    let err = dbx.delete_v2("a", &mut out).unwrap_err();

    // The process must survive to report it, the exact stage is up to hyper
    assert!(err.to_string().starts_with("failed to"), "{err:#}");
    assert!(out.is_empty());
}
