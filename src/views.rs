//! HTML pages
//!
//! Pages are rendered from plain format strings. Every piece of user-supplied
//! text goes through [`escape`].

use std::collections::HashMap;

use crate::ml::FEATURE_LAYOUT;
use crate::risk::{ScoringResult, CLINICAL_ALERT_MESSAGE};

/// One-shot message shown above the page content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash<'a> {
    Success(&'a str),
    Error(&'a str),
}

impl Flash<'_> {
    fn render(&self) -> String {
        let (class, message) = match self {
            Flash::Success(m) => ("success", m),
            Flash::Error(m) => ("error", m),
        };
        format!(r#"<div class="flash flash-{}">{}</div>"#, class, escape(message))
    }
}

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

fn layout(title: &str, signed_in: bool, flash: Option<Flash<'_>>, body: &str) -> String {
    let nav = if signed_in {
        r#"<a href="/">Home</a> <a href="/about">About</a> <a href="/services">Services</a> <a href="/dashboard">Dashboard</a> <a href="/contact">Contact</a> <a href="/logout">Logout</a>"#
    } else {
        r#"<a href="/login">Login</a> <a href="/register">Register</a>"#
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Diabetes Risk</title>
<style>
body {{ font-family: sans-serif; max-width: 52rem; margin: 0 auto; padding: 1rem; }}
nav a {{ margin-right: 0.75rem; }}
.flash {{ padding: 0.5rem 1rem; margin: 1rem 0; border-radius: 4px; }}
.flash-success, .success {{ background: #d1e7dd; color: #0f5132; }}
.flash-error, .danger {{ background: #f8d7da; color: #842029; }}
.warning {{ background: #fff3cd; color: #664d03; }}
.risk {{ padding: 1rem; border-radius: 4px; }}
label {{ display: block; margin-top: 0.5rem; }}
</style>
</head>
<body>
<nav>{nav}</nav>
<h1>{title}</h1>
{flash}
{body}
</body>
</html>
"#,
        title = escape(title),
        nav = nav,
        flash = flash.map(|f| f.render()).unwrap_or_default(),
        body = body,
    )
}

fn credentials_form(action: &str, submit: &str) -> String {
    format!(
        r#"<form method="post" action="{action}">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">{submit}</button>
</form>"#
    )
}

pub fn login_page(flash: Option<Flash<'_>>) -> String {
    let body = format!(
        r#"{}<p>No account? <a href="/register">Register</a></p>"#,
        credentials_form("/login", "Log in")
    );
    layout("Login", false, flash, &body)
}

pub fn register_page(flash: Option<Flash<'_>>) -> String {
    let body = format!(
        r#"{}<p>Already registered? <a href="/login">Log in</a></p>"#,
        credentials_form("/register", "Create account")
    );
    layout("Register", false, flash, &body)
}

pub fn home_page(username: &str) -> String {
    let body = format!(
        r#"<p>Welcome, {}.</p>
<p>Estimate the probability of diabetes from eight routine clinical measurements
and see which of them drove the estimate.</p>
<p><a href="/dashboard">Start a new assessment</a></p>"#,
        escape(username)
    );
    layout("Home", true, None, &body)
}

pub fn about_page() -> String {
    let features = FEATURE_LAYOUT
        .iter()
        .map(|f| format!("<li>{}</li>", escape(f.label)))
        .collect::<String>();
    let body = format!(
        r#"<p>The estimate comes from a random forest classifier trained on the Pima
Indians Diabetes dataset. Each prediction is explained with exact Shapley
values over the forest, shown as a waterfall chart.</p>
<p>Measurements used:</p>
<ul>{features}</ul>
<p>This tool supports, and does not replace, professional medical advice.</p>"#
    );
    layout("About", true, None, &body)
}

pub fn services_page() -> String {
    let body = r#"<ul>
<li>Diabetes risk estimation from clinical measurements</li>
<li>Per-feature explanation of every estimate</li>
<li>Clinical alerts for very high glucose or BMI</li>
</ul>"#;
    layout("Services", true, None, body)
}

pub fn contact_page(flash: Option<Flash<'_>>) -> String {
    let body = r#"<form method="post" action="/contact">
<label>Name <input name="name"></label>
<label>Email <input name="email" type="email"></label>
<label>Message <textarea name="message"></textarea></label>
<button type="submit">Send</button>
</form>"#;
    layout("Contact", true, flash, body)
}

/// Greeting and prediction form. `values` refills the form after an error.
pub fn dashboard_page(username: &str, values: &HashMap<String, String>, flash: Option<Flash<'_>>) -> String {
    let inputs = FEATURE_LAYOUT
        .iter()
        .map(|f| {
            let value = values.get(f.key).map(|v| escape(v)).unwrap_or_default();
            format!(
                r#"<label>{label} <input name="{key}" value="{value}" inputmode="decimal" required></label>
"#,
                label = escape(f.label),
                key = f.key,
                value = value,
            )
        })
        .collect::<String>();

    let body = format!(
        r#"<p>Hello, {}. Enter the patient's measurements.</p>
<form method="post" action="/predict">
{}<button type="submit">Predict</button>
</form>"#,
        escape(username),
        inputs
    );
    layout("Dashboard", true, flash, &body)
}

pub fn result_page(result: &ScoringResult) -> String {
    let alert = if result.clinical_alert {
        format!(r#"<div class="flash flash-error">{}</div>"#, escape(CLINICAL_ALERT_MESSAGE))
    } else {
        String::new()
    };

    let chart = result
        .chart
        .as_ref()
        .map(|c| format!(r#"<img alt="Feature contributions" src="{}">"#, c.data_uri()))
        .unwrap_or_else(|| "<p>Explanation unavailable for this prediction.</p>".to_string());

    let contributions = result
        .attribution
        .as_ref()
        .map(|a| {
            let rows = a
                .ranked()
                .iter()
                .map(|c| {
                    format!(
                        "<tr><td>{}</td><td>{}</td><td>{:+.4}</td></tr>",
                        escape(&c.label),
                        c.value,
                        c.contribution
                    )
                })
                .collect::<String>();
            format!(
                "<table><tr><th>Feature</th><th>Value</th><th>Contribution</th></tr>{}</table>",
                rows
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"<div class="risk {color}">
<h2>{label}</h2>
<p>Estimated probability: <strong>{percentage:.2}%</strong></p>
<p>{advice}</p>
</div>
{alert}
{chart}
{contributions}
<p><a href="/dashboard">New assessment</a></p>"#,
        color = result.color,
        label = result.label,
        percentage = result.percentage,
        advice = escape(result.advice),
        alert = alert,
        chart = chart,
        contributions = contributions,
    );
    layout("Result", true, None, &body)
}
