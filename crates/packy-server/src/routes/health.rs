/// GET /healthcheck
pub async fn healthcheck() -> &'static str {
    "Healthy"
}

const ROBOTS: &str = "User-agent: *\nDisallow: /api/\nDisallow: /healthcheck\nDisallow: /metrics\n";

/// GET /robots.txt
pub async fn robots() -> &'static str {
    ROBOTS
}
