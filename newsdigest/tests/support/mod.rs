//! Feed and page fixtures shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

/// RSS 2.0 document with `count` items titled `"{prefix} {n}"`.
pub fn rss_feed(prefix: &str, count: usize) -> String {
    let items: String = (1..=count)
        .map(|n| {
            format!(
                "<item>\
                   <title>{prefix} {n}</title>\
                   <link>https://news.example.com/{prefix}/{n}</link>\
                   <description>&lt;p&gt;Story {n} about {prefix}&lt;/p&gt;</description>\
                   <pubDate>Fri, 15 Mar 2024 09:30:00 +0000</pubDate>\
                 </item>"
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>{prefix}</title><link>https://news.example.com</link><description>fixture</description>{items}</channel></rss>"#
    )
}

pub fn article_page(body: &str) -> String {
    format!(
        "<html><head><title>t</title><style>p {{ color: red; }}</style></head>\
         <body><nav>Home | World</nav><article><p>{body}</p></article>\
         <script>track();</script><footer>Copyright</footer></body></html>"
    )
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client")
}

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline used by tests that talk to [`stalled_server`].
pub const SHORT_TIMEOUT: Duration = Duration::from_secs(1);

/// Accepts connections and never answers within `SHORT_TIMEOUT`.
/// Returns the base URL.
pub async fn stalled_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                drop(socket);
            });
        }
    });
    format!("http://{}", addr)
}
