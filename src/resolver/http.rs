use ::http::{HeaderMap, HeaderValue};
use log::trace;
use reqwest::{blocking::Client, header::CONTENT_TYPE};

use super::{BulkRequest, Transport, TransportError, TransportResponse};
use crate::config::{Credentials, ResolverConfig};

const API_KEY_HEADER: &str = "x-api-key";
// Header names are case-insensitive, `http` only accepts the lowercase form
const CONTEXT_HEADER: &str = "context";

/// A [`Transport`] posting requests to the configured endpoint over HTTPS.
///
/// Certificate verification is off unless [`ResolverConfig::verify_tls`] is set.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn try_new(
        config: &ResolverConfig,
        credentials: &Credentials,
    ) -> Result<HttpTransport, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, header_value(&credentials.api_key)?);
        headers.insert(CONTEXT_HEADER, header_value(&credentials.context)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| format!("could not build HTTP client: {}", e))?;

        Ok(HttpTransport {
            client,
            endpoint: config.endpoint.to_owned(),
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, TransportError> {
    let mut v = HeaderValue::from_str(value)
        .map_err(|e| format!("invalid credential header value: {}", e))?;
    v.set_sensitive(true);
    Ok(v)
}

impl Transport for HttpTransport {
    fn post(&self, request: &BulkRequest) -> Result<TransportResponse, TransportError> {
        trace!(
            "POST {} with {} addresses",
            self.endpoint,
            request.addresses.len()
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status();
        // The status is known at this point, keep it if the body is lost
        let body = response.text().map_err(|e| {
            TransportError::with_response(
                e.to_string(),
                TransportResponse {
                    status,
                    body: String::new(),
                },
            )
        })?;
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
        sync::mpsc,
        thread,
        time::Duration,
    };

    use totems::{assert_err, assert_ok};

    use super::*;
    use crate::address::Address;

    fn credentials(api_key: &str) -> Credentials {
        Credentials {
            api_key: api_key.to_string(),
            context: "tenant".to_string(),
        }
    }

    #[test]
    fn should_build_client() {
        assert_ok!(HttpTransport::try_new(
            &ResolverConfig::default(),
            &credentials("key")
        ));
    }

    #[test]
    fn should_reject_unprintable_credentials() {
        assert_err!(HttpTransport::try_new(
            &ResolverConfig::default(),
            &credentials("bad\nkey")
        ));
    }

    // Accepts one connection, answers `{}` and hands back the request head and body
    fn capture_one_request(listener: TcpListener) -> mpsc::Receiver<(Vec<String>, String)> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut head = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    break;
                }
                head.push(line);
            }
            let length = head
                .iter()
                .find_map(|h| {
                    let (name, value) = h.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = reader.into_inner();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}")
                .unwrap();
            tx.send((head, String::from_utf8(body).unwrap())).unwrap();
        });
        rx
    }

    #[test]
    fn should_send_credentials_and_json_body() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ResolverConfig {
            endpoint: format!("http://{}/_bulkResolve", listener.local_addr().unwrap()),
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let rx = capture_one_request(listener);

        let transport = HttpTransport::try_new(&config, &credentials("key")).unwrap();
        let response = transport
            .post(&BulkRequest::new(&["8.8.8.8".parse::<Address>().unwrap()]))
            .unwrap();
        assert_eq!(response.status, ::http::StatusCode::OK);
        assert_eq!(response.body, "{}");

        let (head, body) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(head[0].starts_with("POST /_bulkResolve "));
        let head = head.iter().map(|h| h.to_lowercase()).collect::<Vec<_>>();
        assert!(head.contains(&"x-api-key: key".to_string()));
        assert!(head.contains(&"context: tenant".to_string()));
        assert!(head.contains(&"content-type: application/json".to_string()));

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"addresses": ["8.8.8.8"], "projection": ["all"]})
        );
    }

    #[test]
    fn should_fail_unreachable_endpoint() {
        let config = ResolverConfig {
            endpoint: "http://127.0.0.1:1/_bulkResolve".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let transport = HttpTransport::try_new(&config, &credentials("key")).unwrap();
        let err = transport
            .post(&BulkRequest {
                addresses: vec!["8.8.8.8".to_string()],
                projection: vec!["all".to_string()],
            })
            .unwrap_err();
        assert_eq!(err.response(), None);
    }
}
