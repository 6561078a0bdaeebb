use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "CHATRELAY_DISABLE_SYSTEM_PROXY";

/// Shared HTTP client for LLM providers.
///
/// Streaming responses can stay open for minutes, so only the connect phase
/// is bounded.
pub(crate) fn build_http_client() -> Client {
    let builder = Client::builder().connect_timeout(std::time::Duration::from_secs(10));
    let builder = if should_disable_system_proxy() {
        builder.no_proxy()
    } else {
        builder
    };

    builder.build().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Falling back to default HTTP client");
        Client::new()
    })
}

fn should_disable_system_proxy() -> bool {
    if std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() {
        return true;
    }

    cfg!(test)
}
