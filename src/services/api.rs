//! Request/response client for the forecast backend

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{
    CoinpulseError, Forecast, ForecastModel, PricePoint, Result, Symbol,
};

/// Base delay between GET attempts, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<PricePoint>,
}

#[derive(Serialize)]
struct ForecastRequest<'a> {
    symbol: &'a str,
    currency: &'a str,
    steps: u32,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Blocking client over `/api/*`
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    retries: u32,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            retries,
        })
    }

    /// Attach a bearer token to every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET with retries on transport failures and 5xx
    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(path);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let request = self.authorized(self.client.get(&url).query(query));
            match request.send() {
                Ok(resp) if resp.status().is_server_error() && attempt <= self.retries => {
                    warn!(%url, status = resp.status().as_u16(), attempt, "retrying request");
                    std::thread::sleep(RETRY_BACKOFF * attempt);
                }
                Ok(resp) => return decode(resp),
                Err(e) if attempt <= self.retries => {
                    warn!(%url, error = %e, attempt, "retrying request");
                    std::thread::sleep(RETRY_BACKOFF * attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path);
        debug!(%url, "POST");
        let resp = self.authorized(self.client.post(&url).json(body)).send()?;
        decode(resp)
    }

    /// Historical price points, oldest first as served
    pub fn history(&self, symbol: Symbol, currency: &str, limit: u32) -> Result<Vec<PricePoint>> {
        let body: HistoryResponse = self.get(
            "/api/history",
            &[
                ("symbol", symbol.ticker().to_string()),
                ("currency", currency.to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        Ok(body.history)
    }

    /// Model forecast for the next `steps` periods
    pub fn forecast(
        &self,
        model: ForecastModel,
        symbol: Symbol,
        currency: &str,
        steps: u32,
    ) -> Result<Forecast> {
        self.post(
            &format!("/api/predict/{}", model.path()),
            &ForecastRequest {
                symbol: symbol.ticker(),
                currency,
                steps,
            },
        )
    }

    /// Batch current prices; symbols missing from the reply are omitted
    pub fn current_prices(&self, symbols: &[Symbol], currency: &str) -> Result<HashMap<Symbol, f64>> {
        let tickers: Vec<&str> = symbols.iter().map(|s| s.ticker()).collect();
        let body: HashMap<String, Value> = self.get(
            "/api/prices",
            &[
                ("symbols", tickers.join(",")),
                ("currency", currency.to_string()),
            ],
        )?;

        Ok(symbols
            .iter()
            .filter_map(|sym| {
                body.get(sym.ticker())
                    .and_then(Value::as_f64)
                    .map(|price| (*sym, price))
            })
            .collect())
    }

    /// Exchange credentials for a bearer token
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let body: TokenResponse = self.post("/api/login", &Credentials { username, password })?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoinpulseError::Auth("Login failed: no token in response".into()))
    }

    /// Create an account, then log in with it
    pub fn register(&self, username: &str, password: &str) -> Result<String> {
        let _: Value = self.post("/api/register", &Credentials { username, password })?;
        self.login(username, password)
    }
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let text = resp.text()?;
    decode_body(status, &text)
}

/// Map a response body to `T`, surfacing `{error}` payloads and HTTP failures
fn decode_body<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(CoinpulseError::Api {
                status: status.as_u16(),
                message: text.trim().to_string(),
            })
        }
    };

    if let Some(message) = value.get("error").filter(|v| !v.is_null()) {
        return Err(CoinpulseError::Api {
            status: status.as_u16(),
            message: message
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| message.to_string()),
        });
    }

    if !status.is_success() {
        return Err(CoinpulseError::Api {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        });
    }

    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// One-shot HTTP server returning `body`; yields the raw request
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 2048];
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5), 0).unwrap()
    }

    #[test]
    fn test_decode_error_field() {
        let err = decode_body::<Value>(StatusCode::OK, r#"{"error":"Unknown symbol"}"#).unwrap_err();
        assert!(matches!(err, CoinpulseError::Api { status: 200, ref message } if message == "Unknown symbol"));
    }

    #[test]
    fn test_decode_non_json_failure() {
        let err = decode_body::<Value>(StatusCode::BAD_GATEWAY, "upstream down\n").unwrap_err();
        assert!(matches!(err, CoinpulseError::Api { status: 502, ref message } if message == "upstream down"));
    }

    #[test]
    fn test_decode_status_without_error_field() {
        let err = decode_body::<Value>(StatusCode::NOT_FOUND, "{}").unwrap_err();
        assert!(matches!(err, CoinpulseError::Api { status: 404, .. }));
    }

    #[test]
    fn test_decode_bad_json_on_success() {
        let err = decode_body::<Value>(StatusCode::OK, "nope").unwrap_err();
        assert!(matches!(err, CoinpulseError::Json(_)));
    }

    #[test]
    fn test_history_request_and_body() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"history":[{"time":"2024-05-01 10:00:00","actual":3000.5},{"time":"2024-05-01 10:10:00","actual":3001.0}]}"#,
        );
        let points = client(&base).history(Symbol::Eth, "USD", 30).unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /api/history?symbol=ETH&currency=USD&limit=30 "));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].actual, 3000.5);
    }

    #[test]
    fn test_forecast_posts_json_with_token() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"predictions":[{"time":"2024-05-02 00:00:00","predicted":3100.0}],"metrics":{"RMSE":2.0,"MAE":1.5,"MSE":4.0,"MdAE":1.2}}"#,
        );
        let forecast = client(&base)
            .with_token(Some("tok123".into()))
            .forecast(ForecastModel::Xgboost, Symbol::Btc, "USD", 5)
            .unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("POST /api/predict/xgboost "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok123"));
        assert!(request.contains(r#"{"symbol":"BTC","currency":"USD","steps":5}"#));
        assert_eq!(forecast.predictions[0].predicted, 3100.0);
        assert_eq!(forecast.metrics.unwrap().mse, 4.0);
    }

    #[test]
    fn test_current_prices_keeps_known_symbols() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"BTC":64000.0,"ETH":3000.0,"DOGE":0.1,"SOL":null}"#,
        );
        let prices = client(&base)
            .current_prices(&[Symbol::Btc, Symbol::Eth, Symbol::Sol], "USD")
            .unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("GET /api/prices?symbols=BTC%2CETH%2CSOL&currency=USD "));
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&Symbol::Btc], 64000.0);
    }

    #[test]
    fn test_login_failure_surfaces_server_message() {
        let (base, server) = serve_once(
            "HTTP/1.1 401 UNAUTHORIZED",
            r#"{"error":"Invalid credentials"}"#,
        );
        let err = client(&base).login("alice", "wrong").unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, CoinpulseError::Api { status: 401, ref message } if message == "Invalid credentials"));
    }

    #[test]
    fn test_login_returns_token() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", r#"{"access_token":"abc.def"}"#);
        let token = client(&base).login("alice", "secret").unwrap();
        let request = server.join().unwrap();
        assert!(request.contains(r#""username":"alice""#));
        assert_eq!(token, "abc.def");
    }
}
