//! Server-rendered dashboard page.
//!
//! Every piece of stored text (class, method, error message) goes through
//! `escape` before it reaches the page.

use std::fmt::Write as _;

use jobrunner_core::{JobQuery, JobRecord, JobStatus, Page};

use crate::app::dto::Flash;
use crate::csrf::CSRF_FIELD;

/// Everything the index page shows.
pub struct IndexPage<'a> {
    pub page: &'a Page<JobRecord>,
    pub query: &'a JobQuery,
    pub flash: Option<Flash>,
    pub csrf_token: &'a str,
}

const PRIORITY_OPTIONS: [(i32, &str); 3] = [(1, "Low"), (2, "Medium"), (3, "High")];

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn render_index(view: &IndexPage<'_>) -> String {
    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Background Job Dashboard</title>\n</head>\n<body>\n<div class=\"container\">\n\
         <h1>Background Job Dashboard</h1>\n",
    );

    if let Some(flash) = view.flash {
        let class = if flash.is_error() { "alert alert-danger" } else { "alert alert-success" };
        let _ = writeln!(html, "<div class=\"{class}\">{}</div>", escape(flash.message()));
    }

    render_filters(&mut html, view.query);
    render_table(&mut html, view.page, view.csrf_token);
    render_pagination(&mut html, view.page, view.query);

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn render_filters(html: &mut String, query: &JobQuery) {
    html.push_str("<form method=\"GET\" action=\"/\" class=\"mb-4\">\n");
    html.push_str("<label for=\"status\">Status:</label>\n");
    html.push_str("<select name=\"status\" id=\"status\" onchange=\"this.form.submit()\">\n");
    html.push_str("<option value=\"\">All Status</option>\n");
    for status in JobStatus::ALL {
        let _ = writeln!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            status.as_str(),
            selected(query.status == Some(status)),
            status.label()
        );
    }
    html.push_str("</select>\n");

    html.push_str("<label for=\"priority\">Priority:</label>\n");
    html.push_str("<select name=\"priority\" id=\"priority\" onchange=\"this.form.submit()\">\n");
    html.push_str("<option value=\"\">All Priorities</option>\n");
    for (value, label) in PRIORITY_OPTIONS {
        let _ = writeln!(
            html,
            "<option value=\"{value}\"{}>{label}</option>",
            selected(query.priority == Some(value))
        );
    }
    html.push_str("</select>\n</form>\n");
}

fn selected(on: bool) -> &'static str {
    if on { " selected" } else { "" }
}

fn render_table(html: &mut String, page: &Page<JobRecord>, csrf_token: &str) {
    html.push_str(
        "<table class=\"table table-bordered\">\n<thead>\n<tr>\
         <th>ID</th><th>Class</th><th>Method</th><th>Priority</th><th>Status</th>\
         <th>Attempts</th><th>Error Message</th><th>Created At</th><th>Last Updated</th>\
         <th>Actions</th></tr>\n</thead>\n<tbody>\n",
    );

    if page.items.is_empty() {
        html.push_str("<tr><td colspan=\"10\">No jobs found.</td></tr>\n");
    }

    for job in &page.items {
        let row_class = match job.status {
            JobStatus::Completed => "table-success",
            JobStatus::Failed => "table-danger",
            JobStatus::Running => "table-warning",
        };
        let _ = write!(
            html,
            "<tr class=\"{row_class}\" data-job-id=\"{id}\"><td>{id}</td><td>{class}</td><td>{method}</td>\
             <td>{priority}</td><td>{status}</td><td>{attempts}</td><td>{error}</td>\
             <td>{created}</td><td>{updated}</td><td>",
            id = job.id,
            class = escape(&job.target.class),
            method = escape(&job.target.method),
            priority = job.priority,
            status = job.status.label(),
            attempts = job.attempts,
            error = escape(job.error_message.as_deref().unwrap_or_default()),
            created = job.created_at.format("%Y-%m-%d %H:%M:%S"),
            updated = job.updated_at.format("%Y-%m-%d %H:%M:%S"),
        );

        if job.can_cancel() {
            action_form(html, job, "cancel", "Cancel", "btn btn-danger", csrf_token);
        } else if job.offers_retry() {
            action_form(html, job, "retry", "Retry", "btn btn-warning", csrf_token);
        }
        html.push_str("</td></tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
}

fn action_form(
    html: &mut String,
    job: &JobRecord,
    action: &str,
    label: &str,
    button_class: &str,
    csrf_token: &str,
) {
    let _ = write!(
        html,
        "<form action=\"/background-jobs/{id}/{action}\" method=\"POST\" style=\"display:inline;\">\
         <input type=\"hidden\" name=\"{CSRF_FIELD}\" value=\"{token}\">\
         <button type=\"submit\" class=\"{button_class}\">{label}</button></form>",
        id = job.id,
        token = escape(csrf_token),
    );
}

fn render_pagination(html: &mut String, page: &Page<JobRecord>, query: &JobQuery) {
    if page.last_page() <= 1 && !page.has_previous() {
        return;
    }

    html.push_str("<nav><ul class=\"pagination\">\n");
    if page.has_previous() {
        let _ = writeln!(
            html,
            "<li class=\"page-item\"><a class=\"page-link\" href=\"{}\">Previous</a></li>",
            page_href(query, page.page - 1)
        );
    }
    let _ = writeln!(
        html,
        "<li class=\"page-item active\"><span class=\"page-link\">Page {} of {}</span></li>",
        page.page,
        page.last_page()
    );
    if page.has_next() {
        let _ = writeln!(
            html,
            "<li class=\"page-item\"><a class=\"page-link\" href=\"{}\">Next</a></li>",
            page_href(query, page.page + 1)
        );
    }
    html.push_str("</ul></nav>\n");
}

/// Link to another page, keeping the current filters.
fn page_href(query: &JobQuery, page: u32) -> String {
    let mut href = format!("/?page={page}");
    if let Some(status) = query.status {
        let _ = write!(href, "&amp;status={}", status.as_str());
    }
    if let Some(priority) = query.priority {
        let _ = write!(href, "&amp;priority={priority}");
    }
    href
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use jobrunner_core::{CANCELED_MESSAGE, JobId, NewJobRecord, Target};

    fn record(id: i64, status: JobStatus, error: Option<&str>) -> JobRecord {
        let mut new = NewJobRecord::running(Target::new("app::jobs::ExampleJob", "handle"), vec![], 1);
        new.status = status;
        new.error_message = error.map(str::to_string);
        JobRecord::from_new(JobId::new(id), new, Utc::now())
    }

    fn render(items: Vec<JobRecord>, query: JobQuery, total: u64) -> String {
        let page = Page::new(items, total, &query);
        render_index(&IndexPage {
            page: &page,
            query: &query,
            flash: None,
            csrf_token: "tok",
        })
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b onclick="x">'&'</b>"#),
            "&lt;b onclick=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn stored_text_is_escaped_in_rows() {
        let html = render(
            vec![record(1, JobStatus::Failed, Some("<script>alert(1)</script>"))],
            JobQuery::default(),
            1,
        );
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn buttons_follow_status_and_message() {
        let html = render(
            vec![
                record(1, JobStatus::Running, None),
                record(2, JobStatus::Failed, Some(CANCELED_MESSAGE)),
                record(3, JobStatus::Failed, None),
                record(4, JobStatus::Failed, Some("boom")),
                record(5, JobStatus::Completed, None),
            ],
            JobQuery::default(),
            5,
        );

        assert!(html.contains("/background-jobs/1/cancel"));
        assert!(html.contains("/background-jobs/2/retry"));
        assert!(html.contains("/background-jobs/3/retry"));
        assert!(!html.contains("/background-jobs/4/"));
        assert!(!html.contains("/background-jobs/5/"));
        assert!(html.contains(r#"name="_token" value="tok""#));
    }

    #[test]
    fn filters_are_preselected_and_kept_in_page_links() {
        let query = JobQuery::new(Some(JobStatus::Failed), Some(3), Some(2));
        let html = render(vec![record(1, JobStatus::Failed, None)], query, 25);

        assert!(html.contains(r#"<option value="failed" selected>Failed</option>"#));
        assert!(html.contains(r#"<option value="3" selected>High</option>"#));
        assert!(html.contains("Page 2 of 3"));
        assert!(html.contains("/?page=1&amp;status=failed&amp;priority=3"));
        assert!(html.contains("/?page=3&amp;status=failed&amp;priority=3"));
    }

    #[test]
    fn flash_is_shown() {
        let query = JobQuery::default();
        let page = Page::new(vec![], 0, &query);
        let html = render_index(&IndexPage {
            page: &page,
            query: &query,
            flash: Some(Flash::RetryRejected),
            csrf_token: "tok",
        });
        assert!(html.contains("Job could not be retried"));
        assert!(html.contains("No jobs found."));
    }
}
