use std::time::Duration;

use anyhow::Context;
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::CONTENT_TYPE,
};

use camper_common::{Transport, TransportError, TransportResponse};

/// Must be created and dropped outside of any tokio runtime.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("camper-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }

    fn send(&self, request: RequestBuilder) -> Result<TransportResponse, TransportError> {
        let response = request.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;
        Ok(TransportResponse { status, body })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, TransportError> {
        self.send(self.client.get(url).timeout(timeout))
    }

    fn post_json(
        &self,
        url: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.send(
            self.client
                .post(url)
                .timeout(timeout)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string()),
        )
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use camper_common::{Engine, FetchKind, RuntimeConfig};
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn get_returns_status_and_body() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/sensors/inside/states/")
            .with_status(200)
            .with_body(r#"[{"entity_name":"temperature","state":"20.5"}]"#)
            .create();

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .get(&format!("{}/sensors/inside/states/", server.url()), TIMEOUT)
            .unwrap();

        mock.assert();
        assert!(response.is_success());
        assert_eq!(
            response.body,
            r#"[{"entity_name":"temperature","state":"20.5"}]"#
        );
    }

    #[test]
    fn error_statuses_are_not_transport_errors() {
        let mut server = Server::new();
        server
            .mock("GET", "/sensors/SmartShunt/states/")
            .with_status(500)
            .with_body("boom")
            .create();

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .get(&format!("{}/sensors/SmartShunt/states/", server.url()), TIMEOUT)
            .unwrap();

        assert_eq!(response.status, 500);
        assert!(!response.is_success());
        assert_eq!(response.body, "boom");
    }

    #[test]
    fn post_sends_json_body() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/action_by_name/camper/pump_state")
            .match_header("content-type", "application/json")
            .match_body(Matcher::JsonString(r#"{"state":"ON"}"#.to_string()))
            .with_status(200)
            .with_body("{}")
            .create();

        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .post_json(
                &format!("{}/action_by_name/camper/pump_state", server.url()),
                r#"{"state":"ON"}"#,
                TIMEOUT,
            )
            .unwrap();

        mock.assert();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn refused_connection_maps_to_connection_error() {
        let transport = ReqwestTransport::new().unwrap();

        let err = transport
            .get("http://127.0.0.1:1/sensors/camper/states/", TIMEOUT)
            .unwrap_err();

        assert!(matches!(err, TransportError::Connection(_)), "{err:?}");
    }

    #[test]
    fn engine_fetches_through_http() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/sensors/SmartSolar/states/")
            .with_status(200)
            .with_body(
                r#"[{"entity_name":"battery_voltage","state":"13.4"},
                    {"entity_name":"battery_charging_current","state":"5.2"},
                    {"entity_name":"charge_state","state":"Absorption"},
                    {"entity_name":"solar_power","state":"120"},
                    {"entity_name":"yield_today","state":"0.8"}]"#,
            )
            .expect(1)
            .create();

        let mut config = RuntimeConfig::default();
        config.api.base_url = server.url();
        let engine = Engine::new(&config, Arc::new(ReqwestTransport::new().unwrap()));
        engine.start().unwrap();
        engine.request_data_fetch(FetchKind::SmartSolar);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !engine.get_smart_solar_data().valid && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        engine.stop();

        mock.assert();
        let solar = engine.get_smart_solar_data();
        assert!(solar.valid);
        assert_eq!(solar.battery_voltage, 13.4);
        assert_eq!(solar.solar_power, 120.0);
    }
}
