use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uinvault_crypto::{ChecksumAlgorithm, Charset};
use uinvault_domain::UinMode;
use uinvault_service::{GenerateOptions, GeneratedUinView, SectorTokenOptions, StructuredOptions};

use crate::error::ApiError;
use crate::state::AppState;

// ── Health ───────────────────────────────────────────────────────────────

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn ready(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.service.pool_stats(None).await?;
    Ok(StatusCode::OK)
}

// ── Request bodies ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RandomSegmentBody {
    pub length: usize,
    pub charset: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct StructuredBody {
    pub template: String,
    #[serde(default)]
    pub literals: HashMap<String, String>,
    #[serde(default)]
    pub randoms: HashMap<String, RandomSegmentBody>,
}

#[derive(Debug, Deserialize)]
pub struct SectorTokenBody {
    pub foundational_uin: String,
    pub sector: String,
    pub token_length: usize,
    #[serde(default)]
    pub deterministic: bool,
    pub salt_len: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GenerateRequestBody {
    pub mode: String,
    pub length: Option<usize>,
    pub charset: Option<String>,
    pub exclude_ambiguous: Option<bool>,
    pub checksum: Option<String>,
    pub structured: Option<StructuredBody>,
    pub sector_token: Option<SectorTokenBody>,
}

fn parse_mode(s: &str) -> Result<UinMode, ApiError> {
    match s {
        "foundational" => Ok(UinMode::Foundational),
        "random" => Ok(UinMode::Random),
        "structured" => Ok(UinMode::Structured),
        "sector_token" => Ok(UinMode::SectorToken),
        other => Err(ApiError::bad_request(format!("unknown mode '{other}'"))),
    }
}

fn parse_charset(s: &str) -> Result<Charset, ApiError> {
    Charset::parse(s).map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_checksum(s: &str) -> Result<Option<ChecksumAlgorithm>, ApiError> {
    match s {
        "none" => Ok(None),
        "iso7064" => Ok(Some(ChecksumAlgorithm::Iso7064)),
        "iso7064mod97" => Ok(Some(ChecksumAlgorithm::Iso7064Mod97)),
        other => {
            if let Some(modulus) = other.strip_prefix("mod_n:") {
                let n: u32 = modulus.parse().map_err(|_| ApiError::bad_request(format!("invalid modulus in '{other}'")))?;
                Ok(Some(ChecksumAlgorithm::ModN(n)))
            } else {
                Err(ApiError::bad_request(format!("unknown checksum algorithm '{other}'")))
            }
        }
    }
}

fn single_char(s: &str) -> Result<char, ApiError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ApiError::bad_request(format!("placeholder key '{s}' must be exactly one character"))),
    }
}

fn convert_structured(body: &StructuredBody) -> Result<StructuredOptions, ApiError> {
    let mut literals = HashMap::with_capacity(body.literals.len());
    for (k, v) in &body.literals {
        literals.insert(single_char(k)?, v.clone());
    }
    let mut randoms = HashMap::with_capacity(body.randoms.len());
    for (k, v) in &body.randoms {
        randoms.insert(single_char(k)?, (v.length, parse_charset(&v.charset)?));
    }
    Ok(StructuredOptions { template: body.template.clone(), literals, randoms })
}

fn convert_sector_token(body: &SectorTokenBody) -> SectorTokenOptions {
    SectorTokenOptions {
        foundational_uin: body.foundational_uin.clone(),
        sector: body.sector.clone(),
        token_length: body.token_length,
        deterministic: body.deterministic,
        salt_len: body.salt_len.unwrap_or(16),
    }
}

fn convert_options(body: &GenerateRequestBody) -> Result<GenerateOptions, ApiError> {
    let charset = body.charset.as_deref().map(parse_charset).transpose()?;
    let checksum = match &body.checksum {
        Some(s) => parse_checksum(s)?,
        None => None,
    };
    let structured = body.structured.as_ref().map(convert_structured).transpose()?;
    let sector_token = body.sector_token.as_ref().map(convert_sector_token);
    Ok(GenerateOptions {
        length: body.length,
        charset,
        exclude_ambiguous: body.exclude_ambiguous,
        checksum,
        structured,
        sector_token,
    })
}

fn generated_view_json(g: &GeneratedUinView) -> Value {
    json!({
        "value": g.value,
        "base": g.base,
        "checksum": g.checksum,
        "provenance": g.provenance,
        "sector_metadata": g.sector_metadata,
    })
}

// ── Generation ───────────────────────────────────────────────────────────

pub async fn post_generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequestBody>,
) -> Result<Json<Value>, ApiError> {
    let mode = parse_mode(&body.mode)?;
    let options = convert_options(&body)?;
    let result = state.service.generate(mode, &options).await?;
    Ok(Json(generated_view_json(&result)))
}

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
    pub value: String,
    pub checksum: String,
}

pub async fn post_validate(State(state): State<AppState>, Json(body): Json<ValidateBody>) -> Result<Json<Value>, ApiError> {
    let algorithm = parse_checksum(&body.checksum)?.ok_or_else(|| ApiError::bad_request("validate requires a concrete checksum algorithm"))?;
    let result = state.service.validate(&body.value, algorithm);
    Ok(Json(json!({ "valid": result.valid, "length": result.length })))
}

#[derive(Debug, Deserialize)]
pub struct OsiaGenerateBody {
    pub transaction_id: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

pub async fn post_osia_generate(
    State(state): State<AppState>,
    Json(body): Json<OsiaGenerateBody>,
) -> Result<Json<Value>, ApiError> {
    let uin = state.service.osia_generate(&body.transaction_id, body.attributes).await?;
    Ok(Json(json!({ "uin": uin })))
}

#[derive(Debug, Deserialize)]
pub struct PreGenerateBody {
    pub count: usize,
    pub mode: String,
    pub scope: String,
    #[serde(default)]
    pub options: GenerateRequestBody,
}

pub async fn post_pre_generate(
    State(state): State<AppState>,
    Json(body): Json<PreGenerateBody>,
) -> Result<Json<Value>, ApiError> {
    let mode = parse_mode(&body.mode)?;
    let options = convert_options(&body.options)?;
    let summary = state.service.pre_generate(body.count, mode, &body.scope, &options).await?;
    Ok(Json(json!({
        "inserted": summary.inserted,
        "failures": summary.failures.iter().map(|f| json!({ "attempt": f.attempt, "error": f.error })).collect::<Vec<_>>(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchGenerateBody {
    pub count: usize,
    pub mode: String,
    #[serde(default)]
    pub options: GenerateRequestBody,
}

pub async fn post_batch_generate(
    State(state): State<AppState>,
    Json(body): Json<BatchGenerateBody>,
) -> Result<Json<Value>, ApiError> {
    let mode = parse_mode(&body.mode)?;
    let options = convert_options(&body.options)?;
    let batch = state.service.batch_generate(body.count, mode, &options).await?;
    Ok(Json(Value::Array(batch.iter().map(generated_view_json).collect())))
}

// ── Lifecycle ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClaimBody {
    pub scope: Option<String>,
    pub client_id: String,
    pub actor: String,
}

pub async fn post_claim(State(state): State<AppState>, Json(body): Json<ClaimBody>) -> Result<Json<Value>, ApiError> {
    let claimed = state.service.claim(body.scope.as_deref(), &body.client_id, &body.actor).await?;
    Ok(Json(json!({ "claimed": claimed })))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub assigned_to_ref: String,
    pub actor: String,
}

pub async fn post_assign(
    State(state): State<AppState>,
    Path(uin): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Value>, ApiError> {
    let record = state.service.assign(&uin, &body.assigned_to_ref, &body.actor).await?;
    Ok(Json(json!(record)))
}

#[derive(Debug, Deserialize)]
pub struct ActorBody {
    pub actor: String,
}

pub async fn post_release(
    State(state): State<AppState>,
    Path(uin): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Json<Value>, ApiError> {
    let record = state.service.release(&uin, &body.actor).await?;
    Ok(Json(json!(record)))
}

#[derive(Debug, Deserialize)]
pub struct ReasonActorBody {
    pub reason: String,
    pub actor: String,
}

pub async fn post_retire(
    State(state): State<AppState>,
    Path(uin): Path<String>,
    Json(body): Json<ReasonActorBody>,
) -> Result<Json<Value>, ApiError> {
    let record = state.service.retire(&uin, &body.reason, &body.actor).await?;
    Ok(Json(json!(record)))
}

pub async fn post_revoke(
    State(state): State<AppState>,
    Path(uin): Path<String>,
    Json(body): Json<ReasonActorBody>,
) -> Result<Json<Value>, ApiError> {
    let record = state.service.revoke(&uin, &body.reason, &body.actor).await?;
    Ok(Json(json!(record)))
}

#[derive(Debug, Deserialize)]
pub struct CleanupStaleBody {
    pub threshold_seconds: u64,
    pub actor: String,
}

pub async fn post_cleanup_stale(
    State(state): State<AppState>,
    Json(body): Json<CleanupStaleBody>,
) -> Result<Json<Value>, ApiError> {
    let released = state.service.cleanup_stale(Duration::from_secs(body.threshold_seconds), &body.actor).await?;
    Ok(Json(json!({ "released": released })))
}

pub async fn get_lookup(State(state): State<AppState>, Path(uin): Path<String>) -> Result<Json<Value>, ApiError> {
    let record = state
        .service
        .lookup(&uin)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("uin '{uin}' not found")))?;
    Ok(Json(json!(record)))
}

pub async fn get_audit(State(state): State<AppState>, Path(uin): Path<String>) -> Result<Json<Value>, ApiError> {
    let entries = state.service.audit(&uin).await?;
    Ok(Json(json!(entries)))
}

#[derive(Debug, Deserialize, Default)]
pub struct PoolStatsQuery {
    pub scope: Option<String>,
}

pub async fn get_pool_stats(
    State(state): State<AppState>,
    Query(params): Query<PoolStatsQuery>,
) -> Result<Json<Value>, ApiError> {
    let stats = state.service.pool_stats(params.scope.as_deref()).await?;
    let mut out = Map::with_capacity(stats.len());
    for (status, count) in stats {
        out.insert(status.to_string(), json!(count));
    }
    Ok(Json(Value::Object(out)))
}
