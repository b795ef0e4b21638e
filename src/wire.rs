use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldInfo, QueryResponse,
    Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::data::DataRow;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::RentdAuthSource;
use crate::engine::{Engine, EngineError, NewBooking};
use crate::model::{Booking, Equipment, StockStatus};
use crate::observability;
use crate::sql::{self, Command};

pub struct RentdHandler {
    engine: Arc<Engine>,
    query_parser: Arc<RentdQueryParser>,
}

impl RentdHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(RentdQueryParser),
        }
    }

    async fn execute_command(&self, cmd: Command, format: &Format) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.dispatch(cmd, format).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            observability::QUERIES_TOTAL,
            "command" => label,
            "status" => status
        )
        .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(&self, cmd: Command, format: &Format) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertEquipment {
                name,
                price_per_day,
                stock,
            } => {
                self.engine
                    .add_equipment(name, price_per_day, stock)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateEquipment {
                name,
                price_per_day,
                stock,
            } => {
                self.engine
                    .update_equipment(name, price_per_day, stock)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteEquipment { name } => {
                self.engine.remove_equipment(name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectEquipment => {
                let schema = Arc::new(equipment_schema(format));
                let rows: Vec<PgWireResult<DataRow>> = self
                    .engine
                    .list_equipment()
                    .iter()
                    .map(|e| encode_equipment(&schema, e))
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::InsertBooking {
                booking_code,
                user_name,
                items,
                rent_date,
                return_date,
                payment_method,
                status,
            } => {
                self.engine
                    .create_booking(NewBooking {
                        code: booking_code,
                        user_name,
                        items_json: items,
                        rent_date,
                        return_date,
                        payment_method,
                        status,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SelectBookings => {
                let schema = Arc::new(bookings_schema(format));
                let rows: Vec<PgWireResult<DataRow>> = self
                    .engine
                    .list_bookings()
                    .await
                    .iter()
                    .map(|b| encode_booking(&schema, b))
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectBookingByCode { booking_code } => {
                let booking = self
                    .engine
                    .get_booking(&booking_code)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(bookings_schema(format));
                let rows = vec![encode_booking(&schema, &booking)];
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::UpdateBookingStatus {
                booking_code,
                status,
            } => {
                self.engine
                    .set_booking_status(&booking_code, &status)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::CheckStock {
                items,
                rent_date,
                return_date,
            } => {
                let statuses = self
                    .engine
                    .check_stock(&items, &rent_date, &return_date)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(stock_schema(format));
                let rows: Vec<PgWireResult<DataRow>> = statuses
                    .iter()
                    .map(|s| encode_stock(&schema, s))
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
        }
    }
}

// ── Row schemas ──────────────────────────────────────────────────

fn equipment_schema(format: &Format) -> Vec<FieldInfo> {
    let columns = [
        ("name", Type::VARCHAR),
        ("price_per_day", Type::INT8),
        ("stock", Type::INT8),
    ];
    field_infos(&columns, format)
}

fn bookings_schema(format: &Format) -> Vec<FieldInfo> {
    let columns = [
        ("id", Type::VARCHAR),
        ("booking_code", Type::VARCHAR),
        ("user_name", Type::VARCHAR),
        ("items", Type::VARCHAR),
        ("rent_date", Type::VARCHAR),
        ("return_date", Type::VARCHAR),
        ("payment_method", Type::VARCHAR),
        ("total_price", Type::INT8),
        ("status", Type::VARCHAR),
        ("created_at", Type::INT8),
    ];
    field_infos(&columns, format)
}

fn stock_schema(format: &Format) -> Vec<FieldInfo> {
    let columns = [
        ("item", Type::VARCHAR),
        ("is_available", Type::BOOL),
        ("available_stock", Type::INT8),
        ("message", Type::VARCHAR),
    ];
    field_infos(&columns, format)
}

fn field_infos(columns: &[(&str, Type)], format: &Format) -> Vec<FieldInfo> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, (name, ty))| {
            FieldInfo::new((*name).into(), None, None, ty.clone(), format.format_for(idx))
        })
        .collect()
}

fn encode_equipment(schema: &Arc<Vec<FieldInfo>>, e: &Equipment) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&e.name)?;
    encoder.encode_field(&e.price_per_day)?;
    encoder.encode_field(&e.stock)?;
    Ok(encoder.take_row())
}

fn encode_booking(schema: &Arc<Vec<FieldInfo>>, b: &Booking) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&b.id.to_string())?;
    encoder.encode_field(&b.code)?;
    encoder.encode_field(&b.user_name)?;
    encoder.encode_field(&b.items_json)?;
    encoder.encode_field(&b.period.start.format("%Y-%m-%d").to_string())?;
    encoder.encode_field(&b.period.end.format("%Y-%m-%d").to_string())?;
    encoder.encode_field(&b.payment_method)?;
    encoder.encode_field(&b.total_price)?;
    encoder.encode_field(&b.status.as_str())?;
    encoder.encode_field(&b.created_at)?;
    Ok(encoder.take_row())
}

fn encode_stock(schema: &Arc<Vec<FieldInfo>>, s: &StockStatus) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&s.item)?;
    encoder.encode_field(&s.is_available)?;
    encoder.encode_field(&s.available_stock)?;
    encoder.encode_field(&s.message)?;
    Ok(encoder.take_row())
}

#[async_trait]
impl SimpleQueryHandler for RentdHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(cmd, &Format::UnifiedText).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RentdQueryParser;

#[async_trait]
impl QueryParser for RentdQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        let format = column_format.unwrap_or(&Format::UnifiedText);
        Ok(schema_for_statement(stmt, format))
    }
}

#[async_trait]
impl ExtendedQueryHandler for RentdHandler {
    type Statement = String;
    type QueryParser = RentdQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self
            .execute_command(cmd, &portal.result_column_format)
            .await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_statement(&target.statement, &Format::UnifiedText),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_statement(
            &target.statement.statement,
            &target.result_column_format,
        )))
    }
}

/// Best-effort schema for Describe, before the statement runs.
fn schema_for_statement(sql: &str, format: &Format) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") {
        return vec![];
    }
    if upper.contains("FROM BOOKINGS") {
        bookings_schema(format)
    } else if upper.contains("FROM STOCK") {
        stock_schema(format)
    } else if upper.contains("FROM EQUIPMENT") {
        equipment_schema(format)
    } else {
        vec![]
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct RentdFactory {
    handler: Arc<RentdHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<RentdAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl RentdFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        let auth_source = RentdAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RentdHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RentdFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client socket to completion.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = RentdFactory::new(engine, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    let code = match &e {
        EngineError::Validation(_) => "22023",
        EngineError::EquipmentNotFound(_) | EngineError::BookingNotFound(_) => "P0002",
        EngineError::DuplicateEquipment(_) | EngineError::DuplicateBookingCode(_) => "23505",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::WalError(_) => "XX000",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
