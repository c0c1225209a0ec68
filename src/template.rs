//! Minimal placeholder templates.
//!
//! Templates are plain text with `{{ ... }}` tags:
//!
//! | Tag | Expands to |
//! |-----|------------|
//! | `{{ id }}` | route parameter `id` (or `content`, see below) |
//! | `{{ path }}` | the request path |
//! | `{{ route post id=2 }}` | path of route `post`, relative to the request |
//! | `{{ static assets css/site.css }}` | static asset path, relative to the request |
//! | `{{ viewlet nav }}` | the rendered `nav` viewlet |
//!
//! A route whose matches come from a directory also gets `content`: the
//! matched file, rendered from markdown when it has an `.md` extension.
//! Unknown names and unterminated tags are errors, not empty strings.

use pulldown_cmark::{Options, Parser, html as md_html};

use crate::dispatch::{DispatchError, Request};
use crate::route::Params;

/// Expand every tag in `source`. `name` only labels errors.
pub fn render(
    name: &str,
    source: &str,
    vars: &Params,
    request: &Request<'_>,
) -> Result<String, DispatchError> {
    let error = |message: String| DispatchError::Template {
        template: name.to_string(),
        message,
    };

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| error("unterminated '{{' tag".to_string()))?;
        let tag = after[..end].trim();
        out.push_str(&expand(tag, vars, request).map_err(|e| match e {
            TagError::Dispatch(d) => d,
            TagError::Invalid(message) => error(message),
        })?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

enum TagError {
    Dispatch(DispatchError),
    Invalid(String),
}

impl From<DispatchError> for TagError {
    fn from(e: DispatchError) -> Self {
        TagError::Dispatch(e)
    }
}

fn expand(tag: &str, vars: &Params, request: &Request<'_>) -> Result<String, TagError> {
    let words: Vec<&str> = tag.split_whitespace().collect();
    match words.as_slice() {
        [] => Err(TagError::Invalid("empty tag".to_string())),
        ["viewlet", name] => Ok(request.viewlet(name)?),
        ["static", name, subpath] => Ok(request.static_path(name, subpath)?),
        ["route", name, args @ ..] => {
            let mut params = Params::new();
            for arg in args {
                let (key, value) = arg.split_once('=').ok_or_else(|| {
                    TagError::Invalid(format!("route argument '{arg}' is not key=value"))
                })?;
                params.insert(key.to_string(), value.to_string());
            }
            Ok(request.relative_route_path(name, &params)?)
        }
        [var] => match vars.get(*var) {
            Some(value) => Ok(value.clone()),
            None if *var == "path" => Ok(request.path().to_string()),
            None => Err(TagError::Invalid(format!("unknown variable '{var}'"))),
        },
        _ => Err(TagError::Invalid(format!("cannot parse tag '{tag}'"))),
    }
}

/// Render markdown to HTML.
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(source, options);
    let mut html = String::with_capacity(source.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::SitePath;
    use crate::test_helpers::*;

    fn vars(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn plain_text_passes_through() {
        let (_tmp, site) = scenario_site();
        let ctx = site.context(&Default::default()).unwrap();
        let req = Request::new(SitePath::root(), &ctx);
        assert_eq!(render("t", "no tags", &Params::new(), &req).unwrap(), "no tags");
    }

    #[test]
    fn variables_and_path_expand() {
        let (_tmp, site) = scenario_site();
        let ctx = site.context(&Default::default()).unwrap();
        let req = Request::new(SitePath::parse("/post/1").unwrap(), &ctx);
        let out = render("t", "<h1>{{ id }}</h1> at {{path}}", &vars(&[("id", "1")]), &req).unwrap();
        assert_eq!(out, "<h1>1</h1> at /post/1");
    }

    #[test]
    fn route_and_static_tags_are_relative() {
        let (_tmp, site) = scenario_site();
        let ctx = site.context(&Default::default()).unwrap();
        let req = Request::new(SitePath::parse("/post/1").unwrap(), &ctx);
        let out = render(
            "t",
            "{{ route post id=2 }} {{ static assets logo.png }} {{ route home }}",
            &Params::new(),
            &req,
        )
        .unwrap();
        assert_eq!(out, "2 ../assets/logo.png ../");
    }

    #[test]
    fn unknown_variable_is_error() {
        let (_tmp, site) = scenario_site();
        let ctx = site.context(&Default::default()).unwrap();
        let req = Request::new(SitePath::root(), &ctx);
        let err = render("home.html", "{{ nope }}", &Params::new(), &req).unwrap_err();
        assert!(matches!(err, DispatchError::Template { template, .. } if template == "home.html"));
    }

    #[test]
    fn unterminated_tag_is_error() {
        let (_tmp, site) = scenario_site();
        let ctx = site.context(&Default::default()).unwrap();
        let req = Request::new(SitePath::root(), &ctx);
        assert!(render("t", "oops {{ id", &vars(&[("id", "1")]), &req).is_err());
    }

    #[test]
    fn unknown_route_is_route_error() {
        let (_tmp, site) = scenario_site();
        let ctx = site.context(&Default::default()).unwrap();
        let req = Request::new(SitePath::root(), &ctx);
        let err = render("t", "{{ route nowhere }}", &Params::new(), &req).unwrap_err();
        assert!(matches!(err, DispatchError::Route(_)));
    }

    #[test]
    fn markdown_renders_html() {
        let html = markdown_to_html("# Title\n\nSome *text*.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }
}
