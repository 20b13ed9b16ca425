//! Interactive explorer (GraphiQL) page.

use async_graphql::http::GraphiQLSource;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::HOST;
use axum::response::Html;

use crate::config::{ExplorerDisplayOptions, PassHeader, ServerConfig};

/// Everything needed to render the explorer page pointed at the GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct ExplorerPage {
    endpoint: String,
    subscription_port: Option<u16>,
    display: ExplorerDisplayOptions,
}

impl ExplorerPage {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            endpoint: config.path.clone(),
            subscription_port: config.use_subscription.then_some(config.subscription_port),
            display: config.explorer_display_options.clone(),
        }
    }

    /// Render the page. `host` is the `Host` the browser used, needed to point
    /// the explorer at the subscription listener.
    pub fn render(&self, host: Option<&str>) -> String {
        let subscription_endpoint = self
            .subscription_port
            .map(|port| format!("ws://{}:{}/", hostname(host.unwrap_or("localhost")), port));

        let mut source = GraphiQLSource::build().endpoint(&self.endpoint);
        if let Some(endpoint) = &subscription_endpoint {
            source = source.subscription_endpoint(endpoint);
        }
        if let Some(title) = &self.display.title {
            source = source.title(title);
        }
        for (name, value) in &self.display.headers {
            source = source.header(name, value);
        }
        let html = source.finish();

        match &self.display.pass_header {
            Some(pass) => inject_script(html, &pass_header_script(pass)),
            None => html,
        }
    }
}

pub(super) async fn handler(State(page): State<ExplorerPage>, headers: HeaderMap) -> Html<String> {
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    Html(page.render(host))
}

/// Strip the port from a `Host` value, keeping bracketed IPv6 addresses intact.
fn hostname(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && (!name.contains(':') || name.ends_with(']')) =>
        {
            name
        }
        _ => host,
    }
}

/// JSON string literal that is also safe inside a `<script>` element.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace('<', "\\u003c")
}

/// Wraps `fetch` so every request carries the header read from local storage,
/// unless the request already sets it.
fn pass_header_script(pass: &PassHeader) -> String {
    format!(
        "<script>(function(){{var h={header},k={key},f=window.fetch;\
         window.fetch=function(input,init){{var t=window.localStorage.getItem(k);\
         if(t){{init=Object.assign({{}},init);init.headers=Object.assign({{}},init.headers);\
         if(!(h in init.headers)){{init.headers[h]=t;}}}}\
         return f.call(this,input,init);}};}})();</script>",
        header = js_string(&pass.header),
        key = js_string(&pass.storage_key),
    )
}

fn inject_script(html: String, script: &str) -> String {
    match html.find("</head>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..at]);
            out.push_str(script);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{script}{html}"),
    }
}
