use std::net::SocketAddr;

use axum::{Router, extract::RawQuery, http::StatusCode, routing::get};
use every8d::{ReportMessage, parse_report_message};
use tracing::{info, warn};

pub fn router() -> Router {
    Router::new().route("/callback", get(callback))
}

/// Serve `GET /callback` on all interfaces until Ctrl-C.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("report webhook listening on http://{}/callback", addr);

    axum::serve(listener, router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("report webhook shutting down");
        })
        .await?;

    Ok(())
}

/// EVERY8D delivery/reply report callback.
pub async fn callback(RawQuery(query): RawQuery) -> (StatusCode, String) {
    match parse_report_message(query.as_deref().unwrap_or_default()) {
        Ok(report) => {
            info!(
                batch_id = %report.batch_id,
                destination = %report.destination,
                status = %report.status,
                reply = report.is_reply(),
                "received report"
            );
            println!("{}", format_report(&report));
            (StatusCode::OK, String::new())
        }
        Err(err) => {
            warn!(%err, "rejected report");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

pub fn format_report(report: &ReportMessage) -> String {
    [
        report.batch_id.as_str(),
        report.destination.as_str(),
        report.report_time.as_str(),
        &report.status.to_string(),
        report.status.text(),
        report.reply_message.as_str(),
        report.message_no.as_str(),
    ]
    .join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_a_well_formed_report() {
        let query = "BATCHID=abc&RM=%2B886987654321&RT=20090210120000&STATUS=100&SM=&MR=001";
        let (status, body) = callback(RawQuery(Some(query.to_owned()))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn rejects_a_report_with_a_bad_status() {
        let (status, body) = callback(RawQuery(Some("BATCHID=abc&STATUS=oops".to_owned()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("oops"));

        let (status, _) = callback(RawQuery(None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn report_lines_are_tab_separated() {
        let report = parse_report_message("BATCHID=abc&RM=0912345678&RT=20090210120000&STATUS=101")
            .unwrap();
        assert_eq!(
            format_report(&report),
            "abc\t0912345678\t20090210120000\t101\t手機端因素未能送達\t\t"
        );
    }
}
