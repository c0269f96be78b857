use actix_web::{HttpResponse, Responder, get, http::header::ContentType, web};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::{PipelineError, PipelineResult};
use crate::handlers::{blocking_error, error_response};
use crate::mesh::{build_mesh, encode_mesh, gzip};

#[derive(Deserialize)]
pub struct MeshQuery {
    pub dataset: String,
    pub threshold: Option<f64>,
    /// 缺省时取第一个时间步
    pub timestep: Option<u32>,
    #[serde(default)]
    pub gzip: bool,
}

struct EncodedMesh {
    timestep: Option<u32>,
    threshold: f64,
    vertices: usize,
    triangles: usize,
    bytes: Vec<u8>,
}

fn encode_timestep(state: &AppState, query: &MeshQuery) -> PipelineResult<EncodedMesh> {
    let bundle = state.load_bundle(&query.dataset, query.threshold)?;
    let timestep = match query.timestep {
        Some(ts) if bundle.cells(ts).is_none() => {
            return Err(PipelineError::TimestepNotFound { timestep: ts });
        }
        Some(ts) => Some(ts),
        None => bundle.timesteps.first().copied(),
    };

    let cells = timestep
        .and_then(|ts| bundle.cells(ts))
        .map(|ts| ts.cells.as_slice())
        .unwrap_or_default();
    let mesh = build_mesh(cells, &bundle.grid);
    let mut bytes = encode_mesh(&mesh)?;
    if query.gzip {
        bytes = gzip(&bytes)?;
    }
    Ok(EncodedMesh {
        timestep,
        threshold: bundle.threshold,
        vertices: mesh.vertex_count(),
        triangles: mesh.triangle_count(),
        bytes,
    })
}

/// 单个时间步的二进制网格
/// 例如: /mesh?dataset=sleipner&threshold=0.1&timestep=3&gzip=true
#[get("/mesh")]
pub async fn get_mesh(data: web::Data<AppState>, query: web::Query<MeshQuery>) -> impl Responder {
    let state = data.clone();
    let query = query.into_inner();
    let dataset = query.dataset.clone();
    let compressed = query.gzip;

    let encoded = match web::block(move || encode_timestep(&state, &query)).await {
        Ok(Ok(encoded)) => encoded,
        Ok(Err(err)) => return error_response(err),
        Err(err) => return blocking_error(err),
    };

    let timestep = encoded
        .timestep
        .map(|ts| ts.to_string())
        .unwrap_or_default();
    HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .append_header(("X-Mesh-Dataset", dataset))
        .append_header(("X-Mesh-Timestep", timestep))
        .append_header(("X-Mesh-Threshold", format!("{:.2}", encoded.threshold)))
        .append_header(("X-Mesh-Vertices", encoded.vertices.to_string()))
        .append_header(("X-Mesh-Triangles", encoded.triangles.to_string()))
        .append_header((
            "X-Mesh-Encoding",
            if compressed { "gzip" } else { "identity" },
        ))
        .body(encoded.bytes)
}
