use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// The base URL comes in through the environment here, covering the
/// TRACKED_API_URL startup path that headless shells rely on.
fn spawn_sidecar(base_url: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_trackedd");
    let mut child = Command::new(exe)
        .env("TRACKED_API_URL", base_url)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn trackedd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

struct StubRoute {
    method: &'static str,
    path: &'static str,
    status: u16,
    body: Vec<u8>,
}

fn json_route(method: &'static str, path: &'static str, status: u16, body: Value) -> StubRoute {
    StubRoute {
        method,
        path,
        status,
        body: body.to_string().into_bytes(),
    }
}

fn spawn_stub(routes: Vec<StubRoute>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub backend");
    let addr = listener.local_addr().expect("stub addr");
    thread::spawn(move || {
        for conn in listener.incoming() {
            let Ok(mut stream) = conn else { break };
            let _ = serve_one(&mut stream, &routes);
        }
    });
    format!("http://{}", addr)
}

fn serve_one(stream: &mut TcpStream, routes: &[StubRoute]) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();
    let path = target.split('?').next().unwrap_or("").to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let trimmed = header.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(v) = trimmed.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = v.trim().parse().unwrap_or(0);
        }
    }
    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body)?;
    }

    let (status, body) = match routes.iter().find(|r| r.method == method && r.path == path) {
        Some(r) => (r.status, r.body.clone()),
        None => (
            404,
            b"{\"success\":false,\"message\":\"no such route\"}".to_vec(),
        ),
    };
    write!(
        stream,
        "HTTP/1.1 {} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    )?;
    stream.write_all(&body)?;
    stream.flush()
}

fn select_profile(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    profile: &Path,
) {
    let selected = request(
        stdin,
        reader,
        "profile-1",
        "profile.select",
        json!({ "path": profile.to_string_lossy() }),
    );
    assert_eq!(selected["ok"], true, "profile.select failed: {}", selected);
}

fn routes() -> Vec<StubRoute> {
    vec![
        json_route(
            "POST",
            "/trainer/login",
            200,
            json!({
                "success": true,
                "token": "tok-trainer-1",
                "user": { "id": 3, "name": "Lena Ortiz", "email": "lena@tracked.test", "role": "trainer" }
            }),
        ),
        json_route(
            "POST",
            "/applicant/login",
            200,
            json!({
                "success": true,
                "data": {
                    "token": "tok-app-1",
                    "user": { "id": 7, "name": "Iris Chen", "email": "iris@tracked.test", "role": "applicant" }
                }
            }),
        ),
    ]
}

#[test]
fn trainer_session_survives_a_restart_but_applicant_does_not() {
    let base = spawn_stub(routes());
    let profile = temp_dir("tracked-profile");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(&base);
        select_profile(&mut stdin, &mut reader, &profile);

        let trainer = request(
            &mut stdin,
            &mut reader,
            "1",
            "auth.login",
            json!({ "role": "trainer", "email": "lena@tracked.test", "password": "pw" }),
        );
        assert_eq!(trainer["ok"], true);
        let applicant = request(
            &mut stdin,
            &mut reader,
            "2",
            "auth.login",
            json!({ "role": "applicant", "email": "iris@tracked.test", "password": "pw" }),
        );
        assert_eq!(applicant["ok"], true);

        drop(stdin);
        let _ = child.wait();
    }

    // Same profile, fresh process: persistent roles come back, tab-scoped
    // roles start logged out.
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(&base);
        select_profile(&mut stdin, &mut reader, &profile);

        let trainer = request(
            &mut stdin,
            &mut reader,
            "1",
            "auth.status",
            json!({ "role": "trainer" }),
        );
        assert_eq!(trainer["result"]["authenticated"], true);

        let applicant = request(
            &mut stdin,
            &mut reader,
            "2",
            "auth.status",
            json!({ "role": "applicant" }),
        );
        assert_eq!(applicant["result"]["authenticated"], false);

        let logout = request(
            &mut stdin,
            &mut reader,
            "3",
            "auth.logout",
            json!({ "role": "trainer" }),
        );
        assert_eq!(logout["ok"], true);

        drop(stdin);
        let _ = child.wait();
    }

    // Logout removed the stored row for good.
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(&base);
        select_profile(&mut stdin, &mut reader, &profile);

        let trainer = request(
            &mut stdin,
            &mut reader,
            "1",
            "auth.status",
            json!({ "role": "trainer" }),
        );
        assert_eq!(trainer["result"]["authenticated"], false);

        drop(stdin);
        let _ = child.wait();
    }

    let _ = std::fs::remove_dir_all(profile);
}
