//! Pieces shared by every rendered page: the navigation model, pagination,
//! the error page and the redirect helper.

use askama::Template;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use policy::Actor;
use serde::Serialize;
use tracing::error;

use crate::error::AppError;
use crate::schemas::ListQuery;

/// What the layout needs to know about the visitor.
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub signed_in: bool,
    pub username: String,
    pub first_name: String,
    pub is_manager: bool,
    pub is_parent: bool,
}

impl Nav {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_actor(actor: Option<&Actor>) -> Self {
        match actor {
            Some(actor) => Self {
                signed_in: true,
                username: actor.username.clone(),
                first_name: actor.first_name.clone(),
                is_manager: actor.is_manager(),
                is_parent: actor.is_parent,
            },
            None => Self::anonymous(),
        }
    }

    pub fn role_label(&self) -> &'static str {
        if self.is_manager { "Manager" } else { "User" }
    }
}

impl From<&Actor> for Nav {
    fn from(actor: &Actor) -> Self {
        Nav::for_actor(Some(actor))
    }
}

/// One `<option>` of a select box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub id: i32,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    /// Options with the one whose id equals `selected` (a raw form value) marked.
    pub fn list(items: impl IntoIterator<Item = (i32, String)>, selected: &str) -> Vec<Self> {
        let selected = selected.trim().parse::<i32>().ok();
        items
            .into_iter()
            .map(|(id, label)| SelectOption {
                id,
                label,
                selected: Some(id) == selected,
            })
            .collect()
    }
}

/// Pagination links for a list page.
#[derive(Debug, Clone, Default)]
pub struct Pager {
    pub page: u64,
    pub total_pages: u64,
    pub prev_link: String,
    pub next_link: String,
}

#[derive(Serialize)]
struct PageParams<'a> {
    page: u64,
    limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'a str>,
}

impl Pager {
    pub fn new(base: &str, query: &ListQuery, total_pages: u64) -> Self {
        let page = query.page();
        let link = |target: u64| {
            let params = PageParams {
                page: target,
                limit: query.limit(),
                q: query.search(),
            };
            match serde_urlencoded::to_string(&params) {
                Ok(qs) => format!("{base}?{qs}"),
                Err(e) => {
                    error!("Failed to encode pager link: {}", e);
                    base.to_string()
                }
            }
        };
        Self {
            page,
            total_pages: total_pages.max(1),
            prev_link: if page > 1 { link(page - 1) } else { String::new() },
            next_link: if page < total_pages { link(page + 1) } else { String::new() },
        }
    }
}

/// Slice an already loaded list the way a paginated query would.
pub fn page_of<T>(items: Vec<T>, query: &ListQuery) -> (Vec<T>, u64) {
    let limit = query.limit() as usize;
    let pages = items.len().div_ceil(limit) as u64;
    let start = (query.page() as usize - 1).saturating_mul(limit);
    let page = items.into_iter().skip(start).take(limit).collect();
    (page, pages)
}

pub fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

/// `302 Found` pointing at `location`.
pub fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub nav: &'a Nav,
    pub status: u16,
    pub message: &'a str,
}

pub fn error_page(status: StatusCode, nav: &Nav, message: &str) -> Response {
    let template = ErrorTemplate {
        nav,
        status: status.as_u16(),
        message,
    };
    match template.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!("Failed to render error page: {}", e);
            (status, message.to_string()).into_response()
        }
    }
}
