//! Background asset fetching.
//!
//! Each request runs on its own worker thread and reports back over a
//! channel that the render thread drains once per frame. Requests are never
//! cancelled; the scene decides whether a completion is still wanted.

use crate::error::LoadError;
use crossbeam_channel::{Receiver, Sender};
use std::{fmt, fs, io::Read, path::Path, thread, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetSlot {
    PointCloud,
    Markers,
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PointCloud => "point-cloud",
            Self::Markers => "markers",
        })
    }
}

/// Fetched body: raw bytes for the point cloud, decoded text for markers.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

#[derive(Debug)]
pub struct Completion {
    pub slot: AssetSlot,
    pub seq: u64,
    pub url: String,
    pub result: Result<Payload, LoadError>,
}

pub struct AssetLoader {
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    agent: ureq::Agent,
}

impl AssetLoader {
    pub fn new(timeout: Duration) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { tx, rx, agent }
    }

    /// Starts fetching `url` for `slot` in the background.
    pub fn fetch(&self, slot: AssetSlot, seq: u64, url: &str) {
        let tx = self.tx.clone();
        let agent = self.agent.clone();
        let owned = url.to_string();

        log::info!("Fetching {} #{} from {}", slot, seq, url);

        let spawned = thread::Builder::new()
            .name(format!("fetch-{slot}-{seq}"))
            .spawn(move || {
                let result = fetch_payload(&agent, slot, &owned);
                let completion = Completion {
                    slot,
                    seq,
                    url: owned,
                    result,
                };
                if tx.send(completion).is_err() {
                    log::debug!("Dropped {} #{} completion: scene is gone", slot, seq);
                }
            });

        if let Err(e) = spawned {
            let _ = self.tx.send(Completion {
                slot,
                seq,
                url: url.to_string(),
                result: Err(LoadError::fetch(url, format!("could not spawn worker: {e}"))),
            });
        }
    }

    /// Next finished request, if any. Never blocks.
    pub fn try_recv(&self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }
}

fn fetch_payload(agent: &ureq::Agent, slot: AssetSlot, url: &str) -> Result<Payload, LoadError> {
    let bytes = fetch_bytes(agent, url)?;
    Ok(match slot {
        AssetSlot::PointCloud => Payload::Bytes(bytes),
        AssetSlot::Markers => Payload::Text(String::from_utf8_lossy(&bytes).into_owned()),
    })
}

fn is_remote(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads `url` over HTTP(S), or from disk for `file://` URLs and bare paths.
pub fn fetch_bytes(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, LoadError> {
    if !is_remote(url) {
        let path = url.strip_prefix("file://").unwrap_or(url);
        return fs::read(Path::new(path)).map_err(|e| LoadError::fetch(url, e));
    }

    let response = agent
        .get(url)
        .set("Cache-Control", "no-cache")
        .call()
        .map_err(|e| match e {
            ureq::Error::Status(code, resp) => {
                LoadError::fetch(url, format!("HTTP {} {}", code, resp.status_text()))
            }
            ureq::Error::Transport(t) => LoadError::fetch(url, t),
        })?;

    let status = response.status();
    if !(200..300).contains(&status) {
        return Err(LoadError::fetch(url, format!("HTTP {status}")));
    }

    let mut data = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut data)
        .map_err(|e| LoadError::fetch(url, e))?;

    log::debug!("Fetched {} bytes from {}", data.len(), url);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// Serves exactly one canned HTTP response on a loopback port.
    fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            )
            .unwrap();
            stream.write_all(body).unwrap();
        });
        format!("http://{addr}/asset")
    }

    fn agent() -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build()
    }

    #[test]
    fn http_success_returns_body() {
        let url = serve_once("200 OK", b"1,2,3\n");
        assert_eq!(fetch_bytes(&agent(), &url).unwrap(), b"1,2,3\n");
    }

    #[test]
    fn http_error_status_is_a_fetch_failure() {
        let url = serve_once("404 Not Found", b"");
        match fetch_bytes(&agent(), &url) {
            Err(LoadError::Fetch { url: u, reason }) => {
                assert_eq!(u, url);
                assert!(reason.contains("404"), "{reason}");
            }
            other => panic!("expected fetch failure, got {other:?}"),
        }
    }

    #[test]
    fn local_paths_and_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.csv");
        fs::write(&path, "x,y,z\n1,2,3\n").unwrap();

        let plain = path.to_str().unwrap().to_string();
        assert_eq!(fetch_bytes(&agent(), &plain).unwrap(), b"x,y,z\n1,2,3\n");

        let file_url = format!("file://{plain}");
        assert_eq!(fetch_bytes(&agent(), &file_url).unwrap(), b"x,y,z\n1,2,3\n");

        let missing = dir.path().join("nope.ply");
        assert!(matches!(
            fetch_bytes(&agent(), missing.to_str().unwrap()),
            Err(LoadError::Fetch { .. })
        ));
    }

    #[test]
    fn worker_reports_completion_with_slot_and_seq() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        fs::write(&path, "[[0,0,0]]").unwrap();

        let loader = AssetLoader::new(Duration::from_secs(5));
        loader.fetch(AssetSlot::Markers, 7, path.to_str().unwrap());

        let done = loader.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(done.slot, AssetSlot::Markers);
        assert_eq!(done.seq, 7);
        assert_eq!(done.result.unwrap(), Payload::Text("[[0,0,0]]".into()));
        assert!(loader.try_recv().is_none());
    }
}
