//! HTML pages
//!
//! Plain `format!` templates around one shared layout. Every dynamic value
//! goes through [`escape_html`].

use crate::analysis::{DatasetAnalysis, Table};
use crate::auth::Flash;
use crate::evaluation::EvaluationReport;
use crate::prediction::Prediction;
use crate::routing::ClusterAssignment;

pub fn escape_html(s: &str) -> String {
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

/// Who is viewing and what to tell them
pub struct PageContext<'a> {
    pub user: Option<&'a str>,
    pub flashes: &'a [Flash],
}

fn nav(user: Option<&str>) -> String {
    let account = match user {
        Some(email) => format!(
            r#"<span class="user">{}</span> <a href="/logout">Logout</a>"#,
            escape_html(email)
        ),
        None => r#"<a href="/login">Login</a> <a href="/signup">Sign up</a>"#.to_string(),
    };
    format!(
        r#"<nav><a href="/">Home</a> <a href="/form">Predict</a> <a href="/model_performance">Model Performance</a> <a href="/data-analysis">Data Analysis</a> <a href="/database">Database</a> <a href="/about">About</a> {}</nav>"#,
        account
    )
}

fn flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|f| {
            format!(
                r#"<div class="alert alert-{}">{}</div>"#,
                f.category.as_str(),
                escape_html(&f.message)
            )
        })
        .collect()
}

fn layout(ctx: &PageContext<'_>, title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | BMI Forecast</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
{nav}
<main>
{flashes}
{body}
</main>
<script src="/static/script.js"></script>
</body>
</html>"#,
        title = escape_html(title),
        nav = nav(ctx.user),
        flashes = flashes(ctx.flashes),
        body = body,
    )
}

pub fn table(t: &Table, class: &str) -> String {
    let head: String = t
        .headers
        .iter()
        .map(|h| format!("<th>{}</th>", escape_html(h)))
        .collect();
    let rows: String = t
        .rows
        .iter()
        .map(|r| {
            let cells: String = r.iter().map(|c| format!("<td>{}</td>", escape_html(c))).collect();
            format!("<tr>{}</tr>", cells)
        })
        .collect();
    format!(
        r#"<table class="table {}"><thead><tr>{}</tr></thead><tbody>{}</tbody></table>"#,
        class, head, rows
    )
}

pub fn home(ctx: &PageContext<'_>) -> String {
    layout(
        ctx,
        "Home",
        r#"<h1>Post-intervention BMI prediction</h1>
<p>Enter gender, height and weight to estimate BMI after the intervention. Pick a model or let <strong>Best Fit</strong> choose the one that performed best on similar people.</p>
<p><a class="button" href="/form">Start a prediction</a></p>"#,
    )
}

pub fn signup(ctx: &PageContext<'_>) -> String {
    layout(
        ctx,
        "Sign up",
        r#"<h1>Sign up</h1>
<form method="post" action="/signup">
<label>Email <input type="email" name="email"></label>
<label>Password <input type="password" name="password"></label>
<label>Confirm password <input type="password" name="confirm_password"></label>
<button type="submit">Sign up</button>
</form>
<p>Already registered? <a href="/login">Login</a></p>"#,
    )
}

pub fn login(ctx: &PageContext<'_>) -> String {
    layout(
        ctx,
        "Login",
        r#"<h1>Login</h1>
<form method="post" action="/login">
<label>Email <input type="email" name="email"></label>
<label>Password <input type="password" name="password"></label>
<button type="submit">Login</button>
</form>
<p>No account? <a href="/signup">Sign up</a></p>"#,
    )
}

pub fn prediction_form(ctx: &PageContext<'_>, algorithm_options: &[String]) -> String {
    let options: String = algorithm_options
        .iter()
        .map(|o| format!(r#"<option value="{0}">{0}</option>"#, escape_html(o)))
        .collect();
    layout(
        ctx,
        "Predict",
        &format!(
            r#"<h1>Predict BMI</h1>
<form method="post" action="/predict">
<label>Gender <select name="gender"><option value="male">Male</option><option value="female">Female</option></select></label>
<label>Height (cm) <input type="number" step="0.1" name="height" required></label>
<label>Weight (kg) <input type="number" step="0.1" name="weight" required></label>
<label>Algorithm <select name="algorithm">{}</select></label>
<button type="submit">Predict</button>
</form>"#,
            options
        ),
    )
}

pub fn result(ctx: &PageContext<'_>, prediction: &Prediction) -> String {
    let routed = match prediction.cluster {
        Some(cluster) => format!(" (Best Fit, cluster {})", cluster),
        None => String::new(),
    };
    layout(
        ctx,
        "Result",
        &format!(
            r#"<h1>Predicted BMI</h1>
<p class="prediction">{:.2}</p>
<p>Model: {}{}</p>
<p><a href="/form">Predict again</a></p>"#,
            prediction.value,
            escape_html(&prediction.model),
            routed
        ),
    )
}

pub fn about(ctx: &PageContext<'_>) -> String {
    layout(
        ctx,
        "About",
        r#"<h1>About</h1>
<p>Every regression model in the catalog is trained once when the server starts. The training rows are also grouped into clusters, and for each cluster the model with the best fit on that group is remembered. <strong>Best Fit</strong> predictions are served by the model remembered for the cluster closest to your input.</p>"#,
    )
}

pub fn database(ctx: &PageContext<'_>) -> String {
    layout(
        ctx,
        "Database",
        r#"<h1>Dataset</h1>
<p>The models are trained on body-metric records with gender, height (stored in m, converted to cm for the models), weight (kg) and the BMI measured after the intervention (<code>BMI_Post</code>). Identifier and derived columns (person id, feet, inches, pounds, age, BMI) are not used as features.</p>
<p>80% of the rows train the models and 20% are held out for the <a href="/model_performance">performance table</a>.</p>"#,
    )
}

fn cluster_rows(assignments: &[&ClusterAssignment]) -> String {
    assignments
        .iter()
        .map(|a| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{:.4}</td><td>{}</td></tr>",
                a.cluster,
                escape_html(&a.model),
                a.score,
                a.n_samples
            )
        })
        .collect()
}

pub fn performance(ctx: &PageContext<'_>, report: &EvaluationReport, assignments: &[&ClusterAssignment]) -> String {
    let best = report.best();
    let rows: String = report
        .iter()
        .map(|s| {
            let class = if s.name == best.name { r#" class="best""# } else { "" };
            format!(
                "<tr{}><td>{}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td></tr>",
                class,
                escape_html(&s.name),
                s.metrics.mae,
                s.metrics.mse,
                s.metrics.rmse,
                s.metrics.r2
            )
        })
        .collect();

    layout(
        ctx,
        "Model Performance",
        &format!(
            r#"<h1>Model Performance</h1>
<table class="table table-bordered"><thead><tr><th>Model</th><th>MAE</th><th>MSE</th><th>RMSE</th><th>R2</th></tr></thead><tbody>{}</tbody></table>
<p>Best model on the held-out rows: <strong>{}</strong></p>
<h2>Best Fit clusters</h2>
<table class="table table-bordered"><thead><tr><th>Cluster</th><th>Model</th><th>R2</th><th>Rows</th></tr></thead><tbody>{}</tbody></table>"#,
            rows,
            escape_html(&best.name),
            cluster_rows(assignments)
        ),
    )
}

pub fn data_analysis(ctx: &PageContext<'_>, analysis: &DatasetAnalysis) -> String {
    let group = match (&analysis.group_analysis, analysis.group_analysis_text()) {
        (Some(t), _) => table(t, "table-bordered"),
        (None, Some(text)) => format!("<p>{}</p>", escape_html(text)),
        (None, None) => String::new(),
    };
    let freq = match (&analysis.frequency, analysis.frequency_text()) {
        (Some(t), _) => table(t, "table-bordered"),
        (None, Some(text)) => format!("<p>{}</p>", escape_html(text)),
        (None, None) => String::new(),
    };

    layout(
        ctx,
        "Data Analysis",
        &format!(
            r#"<h1>Data Analysis</h1>
<p class="insights">{}</p>
<h2>Preview</h2>{}
<h2>Descriptive statistics</h2>{}
<h2>Missing values</h2>{}
<h2>Correlation</h2>{}
<h2>BMI_Post by gender</h2>{}
<h2>BMI_Post frequency</h2>{}"#,
            escape_html(&analysis.insights),
            table(&analysis.preview, "table-striped"),
            table(&analysis.description, "table-bordered"),
            table(&analysis.missing_values, "table-hover"),
            table(&analysis.correlation, "table-bordered"),
            group,
            freq
        ),
    )
}

pub fn error(ctx: &PageContext<'_>, message: &str) -> String {
    layout(
        ctx,
        "Error",
        &format!(r#"<h1>Something went wrong</h1><p class="error">{}</p>"#, escape_html(message)),
    )
}
