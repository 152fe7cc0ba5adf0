//! Method-name to route conventions
//!
//! REST controllers that do not map a method explicitly get their route from
//! a [`RouteNaming`] implementation. [`ConventionNaming`] understands
//! verb-prefixed identifiers such as `READ_jobs_OF_users_BY_id`
//! (`GET /users/{id}/jobs`).

use crate::pipeline::route::{to_endpoint, HttpMethod};

/// Verbs a parsed identifier binds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbs {
    One(HttpMethod),
    /// Every verb the convention maps (`DO_...`)
    All,
}

impl Verbs {
    const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn methods(&self) -> Vec<HttpMethod> {
        match self {
            Verbs::One(method) => vec![*method],
            Verbs::All => Self::ALL.to_vec(),
        }
    }
}

impl From<HttpMethod> for Verbs {
    fn from(method: HttpMethod) -> Self {
        Verbs::One(method)
    }
}

/// Turns a method identifier into HTTP verbs and a path
///
/// `None` marks the method as non-routable; the binder skips it.
pub trait RouteNaming: Send + Sync {
    fn parse(&self, identifier: &str) -> Option<(Verbs, String)>;
}

const BY: &str = "BY";
const AND: &str = "AND";
const OF: &str = "OF";
const ANY: &str = "ANY";
const FILE: &str = "FILE";

/// Verb-prefixed naming convention
///
/// | token | meaning |
/// |-------|---------|
/// | `READ` `CREATE` `UPDATE` `MODIFY` `DELETE` | GET POST PUT PATCH DELETE, must come first |
/// | `DO` | all five verbs above |
/// | `BY` / `AND` | path parameter after the current resource |
/// | `OF` | parent resource, placed in front |
/// | `ANY` | `*` wildcard |
/// | `FILE` | last word becomes a file extension |
///
/// Other words are joined with `_` into resource names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionNaming;

impl ConventionNaming {
    pub fn new() -> Self {
        Self
    }

    fn verb(token: &str) -> Option<Verbs> {
        match token {
            "READ" => Some(HttpMethod::Get.into()),
            "CREATE" => Some(HttpMethod::Post.into()),
            "UPDATE" => Some(HttpMethod::Put.into()),
            "MODIFY" => Some(HttpMethod::Patch.into()),
            "DELETE" => Some(HttpMethod::Delete.into()),
            "DO" => Some(Verbs::All),
            _ => None,
        }
    }
}

fn is_keyword(token: &str) -> bool {
    matches!(token, BY | AND | OF | ANY | FILE)
}

/// One resource with the parameters that follow it
#[derive(Debug, Default)]
struct Block {
    resource: String,
    params: Vec<String>,
}

impl Block {
    fn new(resource: String) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    fn render(&self) -> String {
        let mut segments = Vec::with_capacity(self.params.len() + 1);
        if !self.resource.is_empty() {
            segments.push(self.resource.clone());
        }
        segments.extend(self.params.iter().map(|p| format!("{{{}}}", p)));
        segments.join("/")
    }
}

/// Read a resource name starting at `start`, stopping at `BY`, `AND` or `OF`
fn read_resource(tokens: &[&str], start: usize) -> (String, usize) {
    let mut resource = String::new();
    let mut glue = false;
    let mut i = start;

    while i < tokens.len() && !matches!(tokens[i], BY | AND | OF) {
        match tokens[i] {
            ANY => {
                resource.push('*');
                glue = true;
            }
            FILE => resource = with_extension(&resource),
            word => {
                if !resource.is_empty() && !glue {
                    resource.push('_');
                }
                resource.push_str(word);
                glue = false;
            }
        }
        i += 1;
    }

    (resource, i)
}

fn with_extension(resource: &str) -> String {
    if let Some(star) = resource.rfind('*') {
        let extension = resource[star + 1..].to_lowercase();
        return format!("{}*.{}", &resource[..star], extension);
    }
    match resource.rfind('_') {
        Some(split) => format!(
            "{}.{}",
            &resource[..split],
            resource[split + 1..].to_lowercase()
        ),
        None => resource.to_string(),
    }
}

/// Read a parameter name: every word up to the next keyword
fn read_param(tokens: &[&str], start: usize) -> (String, usize) {
    let mut i = start;
    while i < tokens.len() && !is_keyword(tokens[i]) {
        i += 1;
    }
    (tokens[start..i].join("_"), i)
}

impl RouteNaming for ConventionNaming {
    fn parse(&self, identifier: &str) -> Option<(Verbs, String)> {
        let tokens: Vec<&str> = identifier.split('_').collect();
        let (first, rest) = tokens.split_first()?;
        let verbs = Self::verb(first)?;

        let (resource, mut i) = read_resource(rest, 0);
        // Front block is the outermost path segment.
        let mut blocks = vec![Block::new(resource)];

        while i < rest.len() {
            match rest[i] {
                BY | AND => {
                    let (param, next) = read_param(rest, i + 1);
                    if param.is_empty() {
                        return None;
                    }
                    blocks[0].params.push(param);
                    i = next;
                }
                OF => {
                    let (parent, next) = read_resource(rest, i + 1);
                    blocks.insert(0, Block::new(parent));
                    i = next;
                }
                ANY => {
                    blocks.insert(0, Block::new("*".to_string()));
                    i += 1;
                }
                _ => i += 1,
            }
        }

        let path = blocks
            .iter()
            .map(Block::render)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        Some((verbs, to_endpoint(&path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(identifier: &str) -> Option<(Verbs, String)> {
        ConventionNaming.parse(identifier)
    }

    fn route(identifier: &str) -> String {
        parse(identifier).map(|(_, path)| path).unwrap_or_default()
    }

    #[test]
    fn test_verbs() {
        assert_eq!(
            parse("READ_users"),
            Some((Verbs::One(HttpMethod::Get), "/users".to_string()))
        );
        assert_eq!(parse("CREATE_users").unwrap().0, Verbs::One(HttpMethod::Post));
        assert_eq!(parse("UPDATE_users").unwrap().0, Verbs::One(HttpMethod::Put));
        assert_eq!(parse("MODIFY_users").unwrap().0, Verbs::One(HttpMethod::Patch));
        assert_eq!(parse("DELETE_users").unwrap().0, Verbs::One(HttpMethod::Delete));
    }

    #[test]
    fn test_do_binds_every_verb() {
        let (verbs, path) = parse("DO_users_BY_id").unwrap();
        assert_eq!(verbs, Verbs::All);
        assert_eq!(path, "/users/{id}");
        assert_eq!(
            verbs.methods(),
            vec![
                HttpMethod::Get,
                HttpMethod::Post,
                HttpMethod::Put,
                HttpMethod::Patch,
                HttpMethod::Delete,
            ]
        );
        assert_eq!(parse("do_users"), None);
    }

    #[test]
    fn test_non_routable_identifiers() {
        assert_eq!(parse("handle_users"), None);
        assert_eq!(parse("read_users"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("READ_users_BY"), None);
    }

    #[test]
    fn test_params() {
        assert_eq!(route("READ_users_BY_id"), "/users/{id}");
        assert_eq!(route("READ_users_BY_id_AND_name"), "/users/{id}/{name}");
        assert_eq!(route("READ_users_BY_user_id"), "/users/{user_id}");
        assert_eq!(route("READ_BY_id"), "/{id}");
    }

    #[test]
    fn test_nested_resources() {
        assert_eq!(route("READ_jobs_OF_users_BY_id"), "/users/{id}/jobs");
        assert_eq!(route("READ_jobs_BY_job_id_OF_users_BY_id"), "/users/{id}/jobs/{job_id}");
        assert_eq!(route("CREATE_user_profiles"), "/user_profiles");
    }

    #[test]
    fn test_wildcards_and_files() {
        assert_eq!(route("READ_ANY"), "/*");
        assert_eq!(route("READ_report_pdf_FILE"), "/report.pdf");
        assert_eq!(route("READ_ANY_pdf_FILE"), "/*.pdf");
        assert_eq!(route("READ_report_PDF_FILE"), "/report.pdf");
        assert_eq!(route("READ"), "/");
    }
}
