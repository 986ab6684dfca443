//! Services served by the `demo-server` binary.
//!
//! [`EntityService`] exercises typed bodies, path/query/header binding,
//! deferred results, failures, streaming, and middleware that halts requests.
//! [`MessageService`] shows a base route with routeless endpoints.

use std::time::Duration;

use axum::Json;
use http::StatusCode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use waymark_core::{Failure, HttpMethod};

use waymark_server::network::{ByteStream, Request, ResponseWriter};
use waymark_server::service::{
    defer, get, middleware_fn, post, request_mapping, Declare, Deferred, Flow, ServiceConfiguration,
};

fn pass_through(_req: &mut Request, _res: &mut ResponseWriter) -> Flow {
    Flow::Continue
}

/// Rejects bodies whose `id` is `"0"` with 413.
fn zero_id_check(req: &mut Request, res: &mut ResponseWriter) -> Flow {
    if req.body().and_then(|body| body.get("id")).and_then(serde_json::Value::as_str) == Some("0") {
        res.status(StatusCode::PAYLOAD_TOO_LARGE).send("id is zero");
        return Flow::Halt;
    }
    Flow::Continue
}

/// Rejects bodies carrying an explicit `"name": null` with 414.
fn name_null_check(req: &mut Request, res: &mut ResponseWriter) -> Flow {
    if req
        .body()
        .and_then(|body| body.get("name"))
        .is_some_and(serde_json::Value::is_null)
    {
        res.status(StatusCode::URI_TOO_LONG).send("name is null");
        return Flow::Halt;
    }
    Flow::Continue
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: Option<String>,
    pub id: String,
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            name: Some("entity".to_string()),
            id: "101".to_string(),
        }
    }
}

/// Stores a single entity.
#[derive(Debug, Default)]
pub struct EntityService {
    data: Mutex<Entity>,
}

impl EntityService {
    fn set_data(&self, Json(entity): Json<Entity>) {
        *self.data.lock() = entity;
    }

    fn get_data(&self, id: String) -> Option<Json<Entity>> {
        let data = self.data.lock();
        (data.id == id).then(|| Json(data.clone()))
    }

    fn get_async_data(
        &self,
        id: String,
    ) -> Deferred<impl std::future::Future<Output = Option<Json<Entity>>> + Send + 'static> {
        let data = self.data.lock().clone();
        defer(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            (data.id == id).then_some(Json(data))
        })
    }

    fn throw_error(&self) -> Result<Json<Entity>, Failure> {
        Err(Failure::from("error thrown"))
    }

    fn throw_async_error(
        &self,
    ) -> Deferred<impl std::future::Future<Output = anyhow::Result<()>> + Send + 'static> {
        defer(async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Err::<(), _>(anyhow::anyhow!("error thrown"))
        })
    }

    fn pipe_data(&self) -> ByteStream {
        ByteStream::from_chunks(["data piped ", "correctly!"])
    }

    fn slice_numbers(&self, id: String, from: usize, to: usize) -> Result<Json<Vec<u32>>, Failure> {
        if id != "101" {
            return Err(Failure::from("unknown id"));
        }
        let data = [3, 4, 5, 6, 7];
        let to = to.min(data.len());
        let from = from.min(to);
        Ok(Json(data[from..to].to_vec()))
    }

    fn data_with_headers(
        &self,
        id: String,
        query: String,
        header1: String,
        header2: String,
    ) -> Result<&'static str, Failure> {
        if id == "myId" && query == "myQuery" && header1 == "myHeader1" && header2 == "myHeader2" {
            Ok("pong")
        } else {
            Err(Failure::from("unknown input"))
        }
    }
}

impl Declare for EntityService {
    fn declare(config: &mut ServiceConfiguration<Self>) {
        config
            .declare_middleware(middleware_fn(name_null_check), None)
            .declare_endpoint(post("/entities"), "set_data", EntityService::set_data)
            .declare_middleware(
                vec![
                    middleware_fn(pass_through),
                    middleware_fn(zero_id_check),
                    middleware_fn(pass_through),
                ],
                Some("set_data"),
            )
            .declare_endpoint(get("/entities/:id"), "get_data", EntityService::get_data)
            .declare_endpoint(
                get("/async_entities/:id"),
                "get_async_data",
                EntityService::get_async_data,
            )
            .declare_endpoint(get("/wrong"), "throw_error", EntityService::throw_error)
            .declare_endpoint(
                get("/wrong_async"),
                "throw_async_error",
                EntityService::throw_async_error,
            )
            .declare_endpoint(get("/stream_data"), "pipe_data", EntityService::pipe_data)
            .declare_endpoint(
                request_mapping(HttpMethod::Get, "/numbers/:id")
                    .query(["from", "to"]),
                "slice_numbers",
                EntityService::slice_numbers,
            )
            .declare_endpoint(
                get("/header_data/:id")
                    .query(["query"])
                    .headers(["header1", "header2"]),
                "data_with_headers",
                EntityService::data_with_headers,
            );
    }
}

/// Holds one message under the `/hi` base route.
#[derive(Debug)]
pub struct MessageService {
    message: Mutex<String>,
}

impl Default for MessageService {
    fn default() -> Self {
        Self {
            message: Mutex::new("hello!".to_string()),
        }
    }
}

impl MessageService {
    fn get_message(&self) -> String {
        self.message.lock().clone()
    }

    fn set_message(&self, message: String) {
        *self.message.lock() = message;
    }
}

impl Declare for MessageService {
    fn declare(config: &mut ServiceConfiguration<Self>) {
        config
            .declare_route("/hi")
            .declare_middleware(middleware_fn(pass_through), None)
            .declare_endpoint(get(""), "get_message", MessageService::get_message)
            .declare_middleware(vec![middleware_fn(pass_through)], Some("get_message"))
            .declare_endpoint(post(""), "set_message", MessageService::set_message);
    }
}
