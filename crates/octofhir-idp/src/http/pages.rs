//! Server-rendered login, consent, and error pages.
//!
//! Plain HTML built with `push_str`; every interpolated value goes through
//! [`html_escape`].

const STYLES: &str = "body{font-family:system-ui,sans-serif;background:#f4f5f9;\
display:flex;justify-content:center;padding-top:10vh;margin:0}\
.card{background:#fff;border:1px solid #dde;border-radius:8px;padding:1.5rem;width:22rem}\
h1{font-size:1.2rem;margin:0 0 1rem}label{display:block;margin:.75rem 0 .25rem}\
input[type=text],input[type=password]{width:100%;padding:.5rem;box-sizing:border-box}\
button{margin-top:1rem;padding:.5rem 1rem}.error{color:#b00020}\
ul{padding-left:1.25rem}";

fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>");
    html.push_str(&html_escape(title));
    html.push_str("</title>\n<style>");
    html.push_str(STYLES);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"card\">\n");
    html.push_str(content);
    html.push_str("\n</div>\n</body>\n</html>");
    html
}

/// Renders the login form for an in-flight authorization request.
#[must_use]
pub fn render_login_form(client_name: &str, session_id: &str, error: Option<&str>) -> String {
    let mut content = String::new();
    content.push_str("<h1>Sign in to continue to ");
    content.push_str(&html_escape(client_name));
    content.push_str("</h1>\n");

    if let Some(e) = error {
        content.push_str("<p class=\"error\">");
        content.push_str(&html_escape(e));
        content.push_str("</p>\n");
    }

    content.push_str("<form method=\"POST\" action=\"login\">\n");
    content.push_str("<input type=\"hidden\" name=\"session_id\" value=\"");
    content.push_str(&html_escape(session_id));
    content.push_str("\">\n");
    content.push_str("<label for=\"username\">Username</label>\n");
    content.push_str(
        "<input type=\"text\" id=\"username\" name=\"username\" autocomplete=\"username\" required autofocus>\n",
    );
    content.push_str("<label for=\"password\">Password</label>\n");
    content.push_str(
        "<input type=\"password\" id=\"password\" name=\"password\" autocomplete=\"current-password\" required>\n",
    );
    content.push_str("<button type=\"submit\">Sign in</button>\n</form>");

    html_page("Sign in", &content)
}

/// Renders the consent form listing the requested scopes.
#[must_use]
pub fn render_consent_form(client_name: &str, scopes: &[String], session_id: &str) -> String {
    let mut content = String::new();
    content.push_str("<h1>");
    content.push_str(&html_escape(client_name));
    content.push_str(" is requesting access</h1>\n<ul>\n");

    for scope in scopes {
        content.push_str("<li>");
        content.push_str(&html_escape(scope_description(scope)));
        content.push_str("</li>\n");
    }

    content.push_str("</ul>\n<form method=\"POST\" action=\"consent\">\n");
    content.push_str("<input type=\"hidden\" name=\"session_id\" value=\"");
    content.push_str(&html_escape(session_id));
    content.push_str("\">\n");
    content.push_str("<button type=\"submit\" name=\"action\" value=\"deny\">Deny</button>\n");
    content.push_str("<button type=\"submit\" name=\"action\" value=\"approve\">Allow</button>\n");
    content.push_str("</form>");

    html_page("Authorize", &content)
}

/// Renders a terminal error page for errors that cannot be redirected.
#[must_use]
pub fn render_error_page(error: &str, description: &str) -> String {
    let mut content = String::new();
    content.push_str("<h1>Authorization error</h1>\n<p class=\"error\">");
    content.push_str(&html_escape(error));
    content.push_str("</p>\n<p>");
    content.push_str(&html_escape(description));
    content.push_str("</p>");

    html_page("Error", &content)
}

fn scope_description(scope: &str) -> &str {
    match scope {
        "openid" => "Verify your identity",
        "profile" => "Read your name and profile picture",
        "email" => "Read your e-mail address",
        "offline_access" => "Stay signed in when you are not present",
        other => other,
    }
}

/// Escapes the characters that are significant in HTML text and attributes.
#[must_use]
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn test_login_form_escapes_client_name() {
        let html = render_login_form("<b>Evil</b>", "sid-1", Some("Invalid username or password"));
        assert!(html.contains("&lt;b&gt;Evil&lt;/b&gt;"));
        assert!(!html.contains("<b>Evil</b>"));
        assert!(html.contains("name=\"session_id\" value=\"sid-1\""));
        assert!(html.contains("Invalid username or password"));
    }

    #[test]
    fn test_consent_form_lists_scopes() {
        let scopes = vec!["openid".to_string(), "custom:read".to_string()];
        let html = render_consent_form("App", &scopes, "sid-2");
        assert!(html.contains("Verify your identity"));
        assert!(html.contains("custom:read"));
        assert!(html.contains("value=\"approve\""));
        assert!(html.contains("value=\"deny\""));
    }

    #[test]
    fn test_error_page() {
        let html = render_error_page("invalid_request", "redirect_uri is not registered");
        assert!(html.contains("invalid_request"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}
