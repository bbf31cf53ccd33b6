//! Locally generated responses.
//!
//! | Code | Reason            | Trigger                                      |
//! |------|-------------------|----------------------------------------------|
//! | 302  | Page Moved        | banned URL or banned content                 |
//! | 304  | Not Modified      | error page requested with `If-Modified-Since`|
//! | 400  | Bad Request       | unparseable request, non-HTTP scheme         |
//! | 404  | Bad Request       | origin host not found                        |
//! | 502  | Server Error      | origin send/receive failure, bad response    |
//! | 504  | Could Not Connect | origin connect failure                       |

use crate::config::PolicyConfig;
use crate::http::Response;

pub fn unparseable_request() -> Response {
    Response::synthetic(400, "Bad Request", "Error while parsing your browsers request")
}

pub fn unsupported_scheme() -> Response {
    Response::synthetic(400, "Bad Request", "Only HTTP protocol is supported")
}

pub fn blocked_url(policy: &PolicyConfig) -> Response {
    redirect(&policy.url_error_page, &policy.url_block_message)
}

pub fn blocked_content(policy: &PolicyConfig) -> Response {
    redirect(&policy.content_error_page, &policy.content_block_message)
}

pub fn not_modified() -> Response {
    Response::synthetic(304, "Not Modified", "")
}

pub fn host_not_found(host: &str) -> Response {
    Response::synthetic(404, "Bad Request", format!("Host {} was not found", host))
}

pub fn connect_failed(host: &str) -> Response {
    Response::synthetic(504, "Could Not Connect", format!("Could not connect to remote server {}", host))
}

pub fn send_failed() -> Response {
    Response::synthetic(502, "Server Error", "Error sending request to remote server")
}

pub fn receive_failed() -> Response {
    Response::synthetic(502, "Server Error", "Error reading response from remote server")
}

fn redirect(location: &str, body: &str) -> Response {
    let mut response = Response::synthetic(302, "Page Moved", body);
    response.headers.set("Location", location);
    response
}
