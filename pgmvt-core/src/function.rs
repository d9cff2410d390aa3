//! Function layers: SQL functions that build a tile for an envelope and a set of keyword parameters.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use deadpool_postgres::Object;
use deadpool_postgres::tokio_postgres::types::ToSql;
use deadpool_postgres::tokio_postgres::{Error as TokioPgError, Row};
use itertools::Itertools as _;
use pgmvt_tile_utils::{TileCoord, TileData, TileEnvelope};
use postgres_protocol::escape::escape_identifier;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tilejson::Bounds;
use tracing::debug;

use crate::PgMvtCoreError::{
    InvalidFunctionName, InvalidParameter, MissingParameter, QueryExecutionError,
};
use crate::PgMvtCoreResult;
use crate::cancel::CancelOnDrop;

/// Query string parameters of a tile request
pub type UrlQuery = HashMap<String, String>;

static PARAM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("regex pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "double")]
    Float,
    #[serde(alias = "string")]
    Text,
    #[serde(alias = "boolean")]
    Bool,
}

impl ParamType {
    fn sql_type(self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Float => "double precision",
            Self::Text => "text",
            Self::Bool => "boolean",
        }
    }

    /// Parse a query string value into this type.
    fn parse(self, value: &str) -> Result<ParamValue, &'static str> {
        match self {
            Self::Int => value
                .parse()
                .map(ParamValue::Int)
                .map_err(|_| "expected an integer"),
            Self::Float => value
                .parse()
                .map(ParamValue::Float)
                .map_err(|_| "expected a number"),
            Self::Text => Ok(ParamValue::Text(value.to_string())),
            Self::Bool => value
                .parse()
                .map(ParamValue::Bool)
                .map_err(|_| "expected true or false"),
        }
    }

    /// Coerce a configured default into this type.
    fn coerce(self, value: &ParamValue) -> Option<ParamValue> {
        match (self, value) {
            (Self::Int, ParamValue::Int(_))
            | (Self::Float, ParamValue::Float(_))
            | (Self::Text, ParamValue::Text(_))
            | (Self::Bool, ParamValue::Bool(_)) => Some(value.clone()),
            (Self::Float, ParamValue::Int(v)) => Some(ParamValue::Float(f64::from(*v))),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f64),
    Text(String),
}

impl ParamValue {
    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Bool(v) => v,
            Self::Int(v) => v,
            Self::Float(v) => v,
            Self::Text(v) => v,
        }
    }
}

/// A declared keyword parameter of a function layer.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub default: Option<ParamValue>,
}

/// A registered function layer.
///
/// The function is called as
/// `function(xmin, ymin, xmax, ymax, epsg, "param" => value, ...)`
/// with the tile envelope in the requested tile matrix set CRS, and must return the MVT bytes.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub id: String,
    /// Optionally schema-qualified SQL function name, e.g. `pg_temp.hexbin`
    pub function: String,
    /// SQL executed before calling the function, e.g. a `CREATE FUNCTION pg_temp...` statement.
    /// Executed inside a transaction that is always rolled back.
    #[serde(default, skip_serializing)]
    pub sql: Option<String>,
    #[serde(default)]
    pub params: Vec<FunctionParam>,
    pub minzoom: Option<u8>,
    pub maxzoom: Option<u8>,
    pub bounds: Option<Bounds>,
    pub srid: Option<i32>,
    pub description: Option<String>,
}

impl FunctionInfo {
    #[must_use]
    pub fn new(id: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            function: function.into(),
            sql: None,
            params: Vec::new(),
            minzoom: None,
            maxzoom: None,
            bounds: None,
            srid: None,
            description: None,
        }
    }

    #[must_use]
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        default: Option<ParamValue>,
    ) -> Self {
        self.params.push(FunctionParam {
            name: name.into(),
            param_type,
            default,
        });
        self
    }

    /// Check the registration values that end up in SQL text, and normalize parameter defaults.
    pub fn validate(&mut self) -> PgMvtCoreResult<()> {
        self.escaped_name()?;
        for param in &mut self.params {
            if !PARAM_NAME.is_match(&param.name) {
                return Err(InvalidParameter {
                    layer: self.id.clone(),
                    param: param.name.clone(),
                    value: String::new(),
                    reason: "parameter names must be plain SQL identifiers".to_string(),
                });
            }
            if let Some(default) = &param.default {
                param.default = Some(param.param_type.coerce(default).ok_or_else(|| {
                    InvalidParameter {
                        layer: self.id.clone(),
                        param: param.name.clone(),
                        value: format!("{default:?}"),
                        reason: format!("default is not a {:?} value", param.param_type),
                    }
                })?);
            }
        }
        if let Some(dup) = self.params.iter().map(|p| &p.name).duplicates().next() {
            return Err(InvalidParameter {
                layer: self.id.clone(),
                param: dup.clone(),
                value: String::new(),
                reason: "parameter is declared more than once".to_string(),
            });
        }
        Ok(())
    }

    fn escaped_name(&self) -> PgMvtCoreResult<String> {
        let parts: Vec<&str> = self.function.split('.').collect();
        if parts.len() > 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(InvalidFunctionName(self.function.clone()));
        }
        Ok(parts.into_iter().map(escape_identifier).join("."))
    }

    /// Validate caller parameters against the declaration and return values in declaration order.
    ///
    /// Unknown parameters are rejected, missing ones fall back to their default.
    pub fn bind_params(&self, query: &UrlQuery) -> PgMvtCoreResult<Vec<ParamValue>> {
        if let Some(unknown) = query
            .keys()
            .filter(|k| !self.params.iter().any(|p| &p.name == *k))
            .sorted()
            .next()
        {
            return Err(InvalidParameter {
                layer: self.id.clone(),
                param: unknown.clone(),
                value: query[unknown].clone(),
                reason: "unknown parameter".to_string(),
            });
        }

        self.params
            .iter()
            .map(|p| match query.get(&p.name) {
                Some(value) => p.param_type.parse(value).map_err(|reason| InvalidParameter {
                    layer: self.id.clone(),
                    param: p.name.clone(),
                    value: value.clone(),
                    reason: reason.to_string(),
                }),
                None => p.default.clone().ok_or_else(|| MissingParameter {
                    layer: self.id.clone(),
                    param: p.name.clone(),
                }),
            })
            .collect()
    }

    /// SQL calling the function. `$1..$4` are the envelope, `$5` its SRID,
    /// followed by one parameter per declared keyword parameter.
    pub fn tile_query(&self) -> PgMvtCoreResult<String> {
        let mut query = format!(
            "SELECT {}($1::double precision, $2::double precision, $3::double precision, $4::double precision, $5::integer",
            self.escaped_name()?
        );
        for (idx, param) in self.params.iter().enumerate() {
            // Writing to a String cannot fail
            let _ = write!(
                query,
                ", {} => ${}::{}",
                escape_identifier(&param.name),
                idx + 6,
                param.param_type.sql_type()
            );
        }
        query.push(')');
        Ok(query)
    }

    pub(crate) async fn get_tile(
        &self,
        mut conn: CancelOnDrop,
        xyz: TileCoord,
        envelope: &TileEnvelope,
        params: &[ParamValue],
    ) -> PgMvtCoreResult<TileData> {
        let query = self.tile_query()?;
        let mut args: Vec<&(dyn ToSql + Sync)> = vec![
            &envelope.xmin,
            &envelope.ymin,
            &envelope.xmax,
            &envelope.ymax,
            &envelope.srid,
        ];
        args.extend(params.iter().map(ParamValue::as_sql));
        debug!("SQL: {query} [{xyz}, {envelope:?}, {params:?}]");

        let row = self.query_tile(conn.client(), &query, &args).await;
        conn.release();

        Ok(row
            .map_err(|e| QueryExecutionError(e, self.id.clone(), xyz))?
            .and_then(|r| r.get::<_, Option<TileData>>(0))
            .unwrap_or_default())
    }

    async fn query_tile(
        &self,
        client: &mut Object,
        query: &str,
        args: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, TokioPgError> {
        if let Some(sql) = &self.sql {
            let tx = client.transaction().await?;
            tx.batch_execute(sql).await?;
            let row = tx.query_opt(query, args).await?;
            tx.rollback().await?;
            Ok(row)
        } else {
            let stmt = client.prepare_cached(query).await?;
            client.query_opt(&stmt, args).await
        }
    }
}
