//! Interactive documentation pages.
//!
//! Both renderers load their bundle from a CDN and fetch the schema document
//! from the API's `openapi_url`, so a page never embeds a stale copy.
//!
//! ```rust
//! use penta_docs::DocsPage;
//!
//! let html = DocsPage::swagger().render("Shop API", "/api/openapi.json");
//! assert!(html.contains("/api/openapi.json"));
//! ```

use bytes::Bytes;

/// Default expansion depth for Swagger UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocExpansion {
    /// Show all operations collapsed.
    None,
    /// Show only the list of operations.
    #[default]
    List,
    /// Expand all operations fully.
    Full,
}

impl DocExpansion {
    const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::List => "list",
            Self::Full => "full",
        }
    }
}

/// Swagger UI options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwaggerSettings {
    /// Update the URL as operations are expanded.
    pub deep_linking: bool,
    /// Default expansion.
    pub doc_expansion: DocExpansion,
    /// Show how long "Try it out" requests took.
    pub display_request_duration: bool,
    /// `swagger-ui-dist` version.
    pub version: String,
}

impl Default for SwaggerSettings {
    fn default() -> Self {
        Self {
            deep_linking: true,
            doc_expansion: DocExpansion::List,
            display_request_duration: true,
            version: "5.18.2".to_string(),
        }
    }
}

/// ReDoc options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedocSettings {
    /// Primary theme colour.
    pub primary_color: String,
    /// Hide the "Download" button.
    pub hide_download_button: bool,
    /// Disable the search box.
    pub disable_search: bool,
    /// ReDoc version.
    pub version: String,
}

impl Default for RedocSettings {
    fn default() -> Self {
        Self {
            primary_color: "#32329f".to_string(),
            hide_download_button: false,
            disable_search: false,
            version: "2.1.5".to_string(),
        }
    }
}

/// The page served at `docs_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocsPage {
    /// Swagger UI.
    Swagger(SwaggerSettings),
    /// ReDoc.
    Redoc(RedocSettings),
}

impl Default for DocsPage {
    fn default() -> Self {
        Self::swagger()
    }
}

impl DocsPage {
    /// Swagger UI with default settings.
    #[must_use]
    pub fn swagger() -> Self {
        Self::Swagger(SwaggerSettings::default())
    }

    /// ReDoc with default settings.
    #[must_use]
    pub fn redoc() -> Self {
        Self::Redoc(RedocSettings::default())
    }

    /// Renders the page for an API titled `title`.
    #[must_use]
    pub fn render(&self, title: &str, openapi_url: &str) -> String {
        match self {
            Self::Swagger(settings) => swagger_html(settings, title, openapi_url),
            Self::Redoc(settings) => redoc_html(settings, title, openapi_url),
        }
    }

    /// Renders the page as response bytes.
    #[must_use]
    pub fn render_bytes(&self, title: &str, openapi_url: &str) -> Bytes {
        Bytes::from(self.render(title, openapi_url))
    }
}

fn swagger_html(settings: &SwaggerSettings, title: &str, openapi_url: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@{version}/swagger-ui.css" />
    <style>
        body {{
            margin: 0;
            background: #fafafa;
        }}
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@{version}/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {{
            window.ui = SwaggerUIBundle({{
                url: "{url}",
                dom_id: '#swagger-ui',
                deepLinking: {deep_linking},
                docExpansion: '{doc_expansion}',
                displayRequestDuration: {display_duration},
                presets: [SwaggerUIBundle.presets.apis],
                layout: "BaseLayout"
            }});
        }};
    </script>
</body>
</html>"##,
        title = html_escape(title),
        version = html_escape(&settings.version),
        url = html_escape(openapi_url),
        deep_linking = settings.deep_linking,
        doc_expansion = settings.doc_expansion.as_str(),
        display_duration = settings.display_request_duration,
    )
}

fn redoc_html(settings: &RedocSettings, title: &str, openapi_url: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            margin: 0;
            padding: 0;
        }}
    </style>
</head>
<body>
    <redoc spec-url="{url}"{hide_download}{disable_search}></redoc>
    <script src="https://cdn.redoc.ly/redoc/v{version}/bundles/redoc.standalone.js"></script>
    <script>
        Redoc.init("{url}", {{ theme: {{ colors: {{ primary: {{ main: "{primary}" }} }} }} }}, document.querySelector("redoc"));
    </script>
</body>
</html>"##,
        title = html_escape(title),
        url = html_escape(openapi_url),
        version = html_escape(&settings.version),
        primary = html_escape(&settings.primary_color),
        hide_download = if settings.hide_download_button { " hide-download-button" } else { "" },
        disable_search = if settings.disable_search { " disable-search" } else { "" },
    )
}

/// Escapes text interpolated into the page.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
