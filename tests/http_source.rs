// tests/http_source.rs
//
// HttpSheetSource against a throwaway local server with canned responses.

use chrono::{TimeZone, Utc};
use saldo_lookup::{
    error::MAKE_PUBLIC_MSG, BalanceLookup, HttpSheetSource, SheetConfig, Tier, TimestampSource,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

struct Reply {
    status: u16,
    body: String,
    headers: Vec<(&'static str, &'static str)>,
}

impl Reply {
    fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            headers: Vec::new(),
        }
    }

    fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: Vec::new(),
        }
    }

    fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

type Router = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

/// Serve `router(path_and_query)` for every request until the test ends.
async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let req = String::from_utf8_lossy(&buf);
                let target = req.split_whitespace().nth(1).unwrap_or("/").to_string();
                let reply = (*router)(target.as_str());

                let mut head = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n",
                    reply.status,
                    reply.body.len()
                );
                for (k, v) in &reply.headers {
                    head.push_str(&format!("{}: {}\r\n", k, v));
                }
                head.push_str("\r\n");
                let _ = sock.write_all(head.as_bytes()).await;
                let _ = sock.write_all(reply.body.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    addr
}

fn source(addr: SocketAddr, config: SheetConfig) -> HttpSheetSource {
    let docs = Url::parse(&format!("http://{}/spreadsheets/d/", addr)).unwrap();
    let drive = Url::parse(&format!("http://{}/drive/v3/files/", addr)).unwrap();
    HttpSheetSource::new(config)
        .unwrap()
        .with_base_urls(docs, drive)
}

fn config() -> SheetConfig {
    SheetConfig {
        spreadsheet_id: "ID1".into(),
        timeout_secs: 5,
        ..SheetConfig::default()
    }
}

fn gviz(table: &str) -> String {
    format!(
        "/*O_o*/\ngoogle.visualization.Query.setResponse({{\"version\":\"0.6\",\"status\":\"ok\",\"table\":{}}});",
        table
    )
}

const LOGIN_PAGE: &str =
    "<!DOCTYPE html><html><head><title>Sign in - Google Accounts</title></head><body></body></html>";

fn is_filtered(target: &str) -> bool {
    target.contains("/gviz/tq") && target.contains("&tq=")
}

#[tokio::test]
async fn test_filtered_query_with_last_modified() {
    let addr = serve(Arc::new(|target: &str| {
        if is_filtered(target) {
            Reply::ok(&gviz(
                r#"{"cols":[{"label":"Patente"},{"label":"Saldo"},{"label":"Cant"},{"label":"Premio"}],"rows":[{"c":[{"v":"ABC123"},{"v":"1.234,5"},null,null]}]}"#,
            ))
            .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
        } else {
            Reply::status(404, "")
        }
    }))
    .await;

    let lookup = BalanceLookup::new(source(addr, config()));
    let rec = lookup.lookup("abc123").await.unwrap().unwrap();
    assert_eq!(rec.tier, Tier::FilteredQuery);
    assert_eq!(rec.balance, 1234.5);
    assert_eq!(rec.customer_label, "ABC123");

    assert_eq!(
        lookup.modified_time().await,
        Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
    );
}

#[tokio::test]
async fn test_full_query_after_filtered_error() {
    let addr = serve(Arc::new(|target: &str| {
        if is_filtered(target) {
            Reply::ok(&format!(
                "setResponse({})",
                r#"{"status":"error","errors":[{"message":"INVALID_QUERY"}]}"#
            ))
        } else if target.contains("/gviz/tq") {
            Reply::ok(&gviz(
                r#"{"cols":[{"label":"Fecha"},{"label":"Cliente"},{"label":"Suma de Cantidad"},{"label":"Suma de MetroPremio"}],"rows":[{"c":[{"v":"Date(2024,0,1)"},{"v":"XYZ999"},{"v":10},{"v":1}]},{"c":[{"v":"Date(2024,0,1)"},{"v":"ABC123"},{"v":100},{"v":30}]}]}"#,
            ))
        } else {
            Reply::status(404, "")
        }
    }))
    .await;

    let lookup = BalanceLookup::new(source(addr, config()));
    let rec = lookup.lookup("ABC 123").await.unwrap().unwrap();
    assert_eq!(rec.tier, Tier::FullQuery);
    assert_eq!(rec.balance, 70.0);
}

#[tokio::test]
async fn test_auth_wall_everywhere() {
    let addr = serve(Arc::new(|_: &str| Reply::ok(LOGIN_PAGE))).await;

    let lookup = BalanceLookup::new(source(addr, config()));
    let err = lookup.lookup("ABC123").await.unwrap_err();
    assert_eq!(err.to_string(), MAKE_PUBLIC_MSG);
}

#[tokio::test]
async fn test_csv_export_fallback() {
    let addr = serve(Arc::new(|target: &str| {
        if target.contains("/export?format=csv&gid=99") {
            Reply::ok("Patente,Saldo\r\n\"AB 123 CD\",\"-2.500,75\"\r\nZZZ,1\r\n")
        } else {
            Reply::status(500, "oops")
        }
    }))
    .await;

    let cfg = SheetConfig {
        sheet_gid: Some("99".into()),
        ..config()
    };
    let lookup = BalanceLookup::from_config(source(addr, cfg.clone()), &cfg);
    let rec = lookup.lookup("ab123cd").await.unwrap().unwrap();
    assert_eq!(rec.tier, Tier::CsvExport);
    assert_eq!(rec.balance, -2500.75);
    assert_eq!(lookup.modified_time().await, None);
}

#[tokio::test]
async fn test_last_modified_ignores_failed_and_csv_replies() {
    let addr = serve(Arc::new(|target: &str| {
        if target.contains("/export?format=csv&gid=99") {
            Reply::ok("Patente,Saldo\r\nABC123,\"7\"\r\n")
                .with_header("Last-Modified", "Thu, 01 Jan 2015 00:00:00 GMT")
        } else {
            Reply::status(500, "oops")
                .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
        }
    }))
    .await;

    let cfg = SheetConfig {
        sheet_gid: Some("99".into()),
        ..config()
    };
    let lookup = BalanceLookup::from_config(source(addr, cfg.clone()), &cfg);
    let rec = lookup.lookup("ABC123").await.unwrap().unwrap();
    assert_eq!(rec.tier, Tier::CsvExport);
    assert_eq!(rec.balance, 7.0);
    assert_eq!(lookup.modified_time().await, None);
}

#[tokio::test]
async fn test_not_found() {
    let addr = serve(Arc::new(|target: &str| {
        if is_filtered(target) {
            Reply::ok(&gviz(r#"{"cols":[],"rows":[]}"#))
        } else {
            Reply::ok(&gviz(
                r#"{"cols":[{"label":"Patente"},{"label":"Saldo"}],"rows":[{"c":[{"v":"ABC123"},{"v":5}]}]}"#,
            ))
        }
    }))
    .await;

    let lookup = BalanceLookup::new(source(addr, config()));
    assert_eq!(lookup.lookup("NOPE1").await, Ok(None));
}

#[tokio::test]
async fn test_drive_api_modified_time() {
    let addr = serve(Arc::new(|target: &str| {
        if target.starts_with("/drive/v3/files/ID1?fields=modifiedTime&key=k1") {
            Reply::ok(r#"{"modifiedTime":"2024-03-05T12:30:00.000Z"}"#)
        } else {
            Reply::status(404, "")
        }
    }))
    .await;

    let cfg = SheetConfig {
        timestamp: TimestampSource::DriveApi {
            api_key: "k1".into(),
        },
        ..config()
    };
    let lookup = BalanceLookup::new(source(addr, cfg));
    assert_eq!(
        lookup.modified_time().await,
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap())
    );
}
