use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;

use probe_api::{AdminError, NamespaceName, TopicAdmin};

/// Тело `PUT /admin/v2/tenants/{tenant}`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TenantInfo<'a> {
    admin_roles: Vec<String>,
    allowed_clusters: &'a [String],
}

/// Pulsar admin REST v2 клиент.
///
/// Коды ответа → `AdminError`:
/// transport / 5xx → Unavailable, 409 → Conflict, 404 → NotFound,
/// прочие не-2xx → Rejected с `reason` из тела.
pub struct HttpAdmin {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAdmin {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AdminError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AdminError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Выполнить запрос и вернуть тело успешного ответа.
    /// `what` — объект запроса для сообщений Conflict / NotFound.
    async fn exec(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        what: &str,
    ) -> Result<String, AdminError> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AdminError::Unavailable(format!("{method} {url}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AdminError::Unavailable(format!("{method} {url}: read body: {e}")))?;

        tracing::debug!(%method, %url, status = status.as_u16(), "admin request");

        if status.is_success() {
            return Ok(body);
        }
        Err(classify(status, &body, what))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, what: &str) -> Result<T, AdminError> {
        let body = self.exec(Method::GET, path, None, what).await?;
        serde_json::from_str(&body).map_err(|e| AdminError::Decode(format!("GET {path}: {e}")))
    }
}

fn classify(status: StatusCode, body: &str, what: &str) -> AdminError {
    if status.is_server_error() {
        return AdminError::Unavailable(format!("HTTP {status}: {}", reason(body)));
    }
    match status {
        StatusCode::CONFLICT => AdminError::Conflict(what.to_string()),
        StatusCode::NOT_FOUND => AdminError::NotFound(what.to_string()),
        _ => AdminError::Rejected {
            status: status.as_u16(),
            reason: reason(body),
        },
    }
}

/// Pulsar кладёт текст ошибки в `{"reason": "..."}`; иначе отдаём тело как есть.
fn reason(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl TopicAdmin for HttpAdmin {
    fn clusters(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdminError>> + Send + '_>> {
        Box::pin(async move { self.get_json("/admin/v2/clusters", "clusters").await })
    }

    fn create_tenant<'a>(
        &'a self,
        tenant: &'a str,
        allowed_clusters: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), AdminError>> + Send + 'a>> {
        Box::pin(async move {
            let info = TenantInfo {
                admin_roles: Vec::new(),
                allowed_clusters,
            };
            let body = serde_json::to_value(&info).map_err(|e| AdminError::Decode(e.to_string()))?;
            self.exec(
                Method::PUT,
                &format!("/admin/v2/tenants/{tenant}"),
                Some(body),
                &format!("tenant '{tenant}'"),
            )
            .await
            .map(|_| ())
        })
    }

    fn create_namespace<'a>(
        &'a self,
        namespace: &'a NamespaceName,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdminError>> + Send + 'a>> {
        Box::pin(async move {
            self.exec(
                Method::PUT,
                &format!("/admin/v2/namespaces/{namespace}"),
                Some(serde_json::json!({})),
                &format!("namespace '{namespace}'"),
            )
            .await
            .map(|_| ())
        })
    }

    fn list_topics<'a>(
        &'a self,
        namespace: &'a NamespaceName,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdminError>> + Send + 'a>> {
        Box::pin(async move {
            self.get_json(
                &format!("/admin/v2/namespaces/{namespace}/topics"),
                &format!("namespace '{namespace}'"),
            )
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_mean_unavailable() {
        let e = classify(StatusCode::BAD_GATEWAY, "", "x");
        assert!(matches!(e, AdminError::Unavailable(_)));
        let e = classify(StatusCode::INTERNAL_SERVER_ERROR, r#"{"reason":"boom"}"#, "x");
        assert_eq!(e, AdminError::Unavailable("HTTP 500 Internal Server Error: boom".into()));
    }

    #[test]
    fn conflict_and_not_found_name_the_object() {
        assert_eq!(
            classify(StatusCode::CONFLICT, "{}", "tenant 'localdev'"),
            AdminError::Conflict("tenant 'localdev'".into())
        );
        assert_eq!(
            classify(StatusCode::NOT_FOUND, "", "namespace 'a/b'"),
            AdminError::NotFound("namespace 'a/b'".into())
        );
    }

    #[test]
    fn other_client_errors_keep_reason() {
        assert_eq!(
            classify(StatusCode::PRECONDITION_FAILED, r#"{"reason":"Clusters do not exist"}"#, "t"),
            AdminError::Rejected {
                status: 412,
                reason: "Clusters do not exist".into()
            }
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, "denied\n", "t"),
            AdminError::Rejected {
                status: 403,
                reason: "denied".into()
            }
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let admin = HttpAdmin::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(admin.base_url(), "http://localhost:8080");
    }
}
