use html_escape::{encode_double_quoted_attribute, encode_text};
use shared::{DamageReport, Prediction};
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; background: #f1f5f9; color: #333; }
nav { background: #5a67d8; padding: 12px 24px; }
nav a { color: white; margin-right: 16px; text-decoration: none; font-weight: 600; }
.container { background: white; border-radius: 12px; padding: 32px; margin: 32px auto; max-width: 800px; box-shadow: 0 10px 30px rgba(0, 0, 0, 0.08); }
.flash { padding: 12px 16px; border-radius: 8px; margin-bottom: 16px; }
.flash.success { background: #c6f6d5; color: #22543d; }
.flash.error { background: #fed7d7; color: #822727; }
.preview { max-width: 100%; border-radius: 8px; }
.result-item { display: flex; align-items: center; gap: 12px; margin: 8px 0; }
.result-label { width: 160px; font-weight: 600; }
.meter { flex: 1; background: #e2e8f0; border-radius: 6px; height: 12px; overflow: hidden; }
.meter-fill { background: #5a67d8; height: 100%; }
.not-damaged .meter-fill { background: #38a169; }
table { width: 100%; border-collapse: collapse; }
td { padding: 8px; border-bottom: 1px solid #e2e8f0; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <nav><a href="/">Upload</a><a href="/manage">Manage</a></nav>
    <div class="container">
{body}
    </div>
</body>
</html>"#,
        title = encode_text(title),
    )
}

/// Upload form. `success` is `None` for a plain GET.
pub fn index_page(csrf_token: &str, success: Option<bool>, errors: &[String]) -> String {
    let mut body = String::from("        <h1>Vehicle damage inspection</h1>\n");
    match success {
        Some(true) => body.push_str(
            r#"        <div class="flash success" data-success="true">Upload successful. Open it from the Manage page.</div>
"#,
        ),
        Some(false) => {
            body.push_str(r#"        <div class="flash error" data-success="false">"#);
            if errors.is_empty() {
                body.push_str("Upload failed.");
            }
            for error in errors {
                let _ = write!(body, "<p>{}</p>", encode_text(error));
            }
            body.push_str("</div>\n");
        }
        None => {}
    }
    let _ = write!(
        body,
        r#"        <form method="post" action="/" enctype="multipart/form-data">
            <input type="hidden" name="csrf_token" value="{}">
            <input type="file" name="photo" accept="image/*" multiple>
            <button type="submit">Upload</button>
        </form>
"#,
        encode_double_quoted_attribute(csrf_token)
    );
    layout("Upload", &body)
}

pub fn manage_page(files: &[String]) -> String {
    let mut body = String::from("        <h1>Uploaded files</h1>\n");
    if files.is_empty() {
        body.push_str("        <p>No files uploaded yet.</p>\n");
    } else {
        body.push_str("        <table>\n");
        for name in files {
            let encoded = urlencoding::encode(name);
            let encoded = encode_double_quoted_attribute(&encoded);
            let _ = writeln!(
                body,
                r#"            <tr><td>{name}</td><td><a href="/open/{encoded}">Open</a></td><td><a href="/delete/{encoded}">Delete</a></td></tr>"#,
                name = encode_text(name),
            );
        }
        body.push_str("        </table>\n");
    }
    layout("Manage", &body)
}

fn result_item(body: &mut String, title: &str, prediction: &Prediction) {
    let percentage = prediction.confidence() * 100.0;
    let _ = writeln!(
        body,
        r#"        <div class="result-item">
            <div class="result-label">{title}</div>
            <div class="result-class">{label}</div>
            <div class="meter"><div class="meter-fill" style="width: {percentage:.1}%"></div></div>
            <div class="result-value">{confidence:.4}</div>
        </div>"#,
        title = encode_text(title),
        label = encode_text(&prediction.label),
        confidence = prediction.confidence(),
    );
}

pub fn result_page(report: &DamageReport) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        r#"        <h1>{}</h1>
        <img class="preview" src="{}" alt="uploaded vehicle">"#,
        encode_text(&report.file_name),
        encode_double_quoted_attribute(&report.file_url)
    );

    match (&report.side, &report.level) {
        (Some(side), Some(level)) => {
            body.push_str(r#"        <div class="results damaged">"#);
            body.push('\n');
            result_item(&mut body, "Damage", &report.damage);
            result_item(&mut body, "Side", side);
            result_item(&mut body, "Level", level);
        }
        _ => {
            let _ = writeln!(
                body,
                r#"        <div class="results not-damaged" data-damaged="{}">"#,
                report.damage.index
            );
            body.push_str("        <p>No damage detected.</p>\n");
            result_item(&mut body, "Damage", &report.damage);
        }
    }
    body.push_str("        </div>\n");
    layout("Inspection result", &body)
}
