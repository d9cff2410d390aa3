use actix_web::HttpRequest;
use pgmvt_core::metadata::RouteReverser;

/// Reverses the named routes of the running server into absolute URLs.
///
/// Scheme and host come from the request, the path is prefixed with the configured base path.
pub struct ActixRoutes<'a> {
    req: &'a HttpRequest,
    base_path: Option<&'a str>,
}

impl<'a> ActixRoutes<'a> {
    #[must_use]
    pub fn new(req: &'a HttpRequest, base_path: Option<&'a str>) -> Self {
        Self { req, base_path }
    }
}

impl RouteReverser for ActixRoutes<'_> {
    fn url_for(&self, route: &str, elements: &[&str]) -> Option<String> {
        // path elements are inserted verbatim and would change the shape of the URL
        if elements.iter().any(|e| e.contains(['/', '?', '#'])) {
            return None;
        }
        let mut url = self.req.url_for(route, elements).ok()?;
        if let Some(base_path) = self.base_path {
            let path = format!("{base_path}{}", url.path());
            url.set_path(&path);
        }
        // keep client placeholders such as {z} readable
        Some(url.as_str().replace("%7B", "{").replace("%7D", "}"))
    }
}
