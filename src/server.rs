//! Thin HTTP delivery surface over the render pipeline
//!
//! Endpoints mirror the panel-fetch contract expected by the display
//! device:
//!
//! - `POST /render/<name>`: body is a JSON object of template data;
//!   returns `image/png` on success
//! - `GET /templates`: available templates and their sidecar configs
//! - `GET /health`: browser + template directory readiness
//!
//! Requests are handled on spawned threads as independent, unsynchronized
//! pipeline invocations; a per-request failure never takes the process
//! down.

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::thread;

use log::{error, info};
use serde_json::{json, Map, Value};
use tiny_http::{Header, Method, Request, Response, Server};

use crate::pipeline::RenderPipeline;
use crate::{Error, Result};

type HttpResponse = Response<Cursor<Vec<u8>>>;

/// Serve the pipeline on `addr` (for example `0.0.0.0:3001`). Blocks.
pub fn serve(pipeline: Arc<RenderPipeline>, addr: &str) -> Result<()> {
    let server =
        Server::http(addr).map_err(|e| Error::Server(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Listening on http://{}", addr);

    for request in server.incoming_requests() {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || handle(&pipeline, request));
    }

    Ok(())
}

fn handle(pipeline: &RenderPipeline, mut request: Request) {
    let method = request.method().clone();
    let path = request.url().to_string();
    info!("{} {}", method, path);

    let response = match (&method, path.as_str()) {
        (Method::Get, "/health") => health_response(pipeline),
        (Method::Get, "/templates") => templates_response(pipeline),
        (Method::Post, p) if p.starts_with("/render/") => {
            let name = p["/render/".len()..].to_string();
            render_response(pipeline, &name, &mut request)
        }
        _ => json_response(404, &json!({"error": "Not found"})),
    };

    if let Err(e) = request.respond(response) {
        error!("Failed to send response: {}", e);
    }
}

fn render_response(pipeline: &RenderPipeline, name: &str, request: &mut Request) -> HttpResponse {
    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        return json_response(400, &json!({"error": "Unreadable request body"}));
    }

    let data = match parse_data_body(&body) {
        Ok(data) => data,
        Err(message) => return json_response(400, &json!({ "error": message })),
    };

    match pipeline.render(name, &data).and_then(|image| image.to_png()) {
        Ok(png_data) => png_response(png_data),
        Err(e @ Error::TemplateNotFound(_)) => json_response(404, &json!({"error": e.to_string()})),
        Err(e) => {
            error!("Render error for {}: {}", name, e);
            json_response(500, &json!({"error": e.to_string()}))
        }
    }
}

fn templates_response(pipeline: &RenderPipeline) -> HttpResponse {
    match pipeline.list_templates() {
        Ok(templates) => json_response(200, &json!({ "templates": templates })),
        Err(e) => json_response(500, &json!({"error": e.to_string()})),
    }
}

fn health_response(pipeline: &RenderPipeline) -> HttpResponse {
    let health = pipeline.health();
    let status = if health.is_ok() { 200 } else { 500 };
    json_response(status, &json!(health))
}

/// An empty or absent body means "no data"; anything else must be a JSON
/// object.
fn parse_data_body(body: &str) -> std::result::Result<Map<String, Value>, String> {
    if body.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Request body must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON body: {}", e)),
    }
}

fn json_response(status: u16, payload: &Value) -> HttpResponse {
    let mut response = Response::from_string(payload.to_string()).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    response
}

fn png_response(data: Vec<u8>) -> HttpResponse {
    let mut response = Response::from_data(data);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"image/png"[..]) {
        response.add_header(header);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_body() {
        assert!(parse_data_body("").unwrap().is_empty());
        assert!(parse_data_body("  \n").unwrap().is_empty());

        let data = parse_data_body(r#"{"temperature": "72"}"#).unwrap();
        assert_eq!(data["temperature"], "72");

        assert!(parse_data_body("[1, 2]").is_err());
        assert!(parse_data_body("{broken").is_err());
    }
}
