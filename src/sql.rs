use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Parsed command from SQL input. Dates and the items payload stay raw
/// strings here; the engine owns their semantic validation.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertEquipment {
        name: String,
        price_per_day: i64,
        stock: i64,
    },
    UpdateEquipment {
        name: String,
        price_per_day: i64,
        stock: i64,
    },
    DeleteEquipment {
        name: String,
    },
    SelectEquipment,
    InsertBooking {
        booking_code: String,
        user_name: String,
        items: String,
        rent_date: String,
        return_date: String,
        payment_method: String,
        status: String,
    },
    SelectBookings,
    SelectBookingByCode {
        booking_code: String,
    },
    UpdateBookingStatus {
        booking_code: String,
        status: String,
    },
    CheckStock {
        items: Vec<String>,
        rent_date: String,
        return_date: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let rows = extract_insert_rows(insert)?;
    if rows.len() != 1 {
        return Err(SqlError::Unsupported("multi-row INSERT".into()));
    }
    let values = &rows[0];

    match table.as_str() {
        "equipment" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("equipment", 3, values.len()));
            }
            Ok(Command::InsertEquipment {
                name: parse_string(&values[0])?,
                price_per_day: parse_i64(&values[1])?,
                stock: parse_i64(&values[2])?,
            })
        }
        "bookings" => {
            if values.len() < 7 {
                return Err(SqlError::WrongArity("bookings", 7, values.len()));
            }
            Ok(Command::InsertBooking {
                booking_code: parse_string(&values[0])?,
                user_name: parse_string(&values[1])?,
                items: parse_string(&values[2])?,
                rent_date: parse_string(&values[3])?,
                return_date: parse_string(&values[4])?,
                payment_method: parse_string(&values[5])?,
                status: parse_string(&values[6])?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    match table.as_str() {
        "equipment" => {
            let name = extract_where_string(selection, "name")?;
            let mut price_per_day = None;
            let mut stock = None;
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "price_per_day" => price_per_day = Some(parse_i64(&a.value)?),
                    "stock" => stock = Some(parse_i64(&a.value)?),
                    other => {
                        return Err(SqlError::Unsupported(format!("cannot update column {other}")))
                    }
                }
            }
            Ok(Command::UpdateEquipment {
                name,
                price_per_day: price_per_day.ok_or(SqlError::MissingAssignment("price_per_day"))?,
                stock: stock.ok_or(SqlError::MissingAssignment("stock"))?,
            })
        }
        "bookings" => {
            let booking_code = extract_where_string(selection, "booking_code")?;
            let mut status = None;
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "status" => status = Some(parse_string(&a.value)?),
                    other => {
                        return Err(SqlError::Unsupported(format!("cannot update column {other}")))
                    }
                }
            }
            Ok(Command::UpdateBookingStatus {
                booking_code,
                status: status.ok_or(SqlError::MissingAssignment("status"))?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    match table.as_str() {
        "equipment" => {
            let name = extract_where_string(&delete.selection, "name")?;
            Ok(Command::DeleteEquipment { name })
        }
        // Bookings are never deleted; cancellation is a status change.
        "bookings" => Err(SqlError::Unsupported(
            "DELETE FROM bookings (set status = 'Cancelled' instead)".into(),
        )),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "equipment" => {
            if select.selection.is_some() {
                return Err(SqlError::Unsupported("WHERE on equipment".into()));
            }
            Ok(Command::SelectEquipment)
        }
        "bookings" => match &select.selection {
            None => Ok(Command::SelectBookings),
            Some(_) => {
                let booking_code = extract_where_string(&select.selection, "booking_code")?;
                Ok(Command::SelectBookingByCode { booking_code })
            }
        },
        "stock" => {
            let (mut items, mut rent_date, mut return_date) = (None, None, None);
            if let Some(selection) = &select.selection {
                extract_stock_filters(selection, &mut items, &mut rent_date, &mut return_date)?;
            }
            Ok(Command::CheckStock {
                items: items.ok_or(SqlError::MissingFilter("item"))?,
                rent_date: rent_date.ok_or(SqlError::MissingFilter("rent_date"))?,
                return_date: return_date.ok_or(SqlError::MissingFilter("return_date"))?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn extract_stock_filters(
    expr: &Expr,
    items: &mut Option<Vec<String>>,
    rent_date: &mut Option<String>,
    return_date: &mut Option<String>,
) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                extract_stock_filters(left, items, rent_date, return_date)?;
                extract_stock_filters(right, items, rent_date, return_date)?;
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left);
                if col.as_deref() == Some("item") {
                    *items = Some(vec![parse_string(right)?]);
                } else if col.as_deref() == Some("rent_date") {
                    *rent_date = Some(parse_string(right)?);
                } else if col.as_deref() == Some("return_date") {
                    *return_date = Some(parse_string(right)?);
                }
            }
            _ => {}
        },
        Expr::InList {
            expr: col,
            list,
            negated: false,
        } => {
            if expr_column_name(col).as_deref() == Some("item") {
                let mut names = Vec::with_capacity(list.len());
                for e in list {
                    names.push(parse_string(e)?);
                }
                *items = Some(names);
            }
        }
        _ => {}
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_string(selection: &Option<Expr>, col: &'static str) -> Result<String, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter(col))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some(col) {
                parse_string(right)
            } else {
                Err(SqlError::MissingFilter(col))
            }
        }
        _ => Err(SqlError::MissingFilter(col)),
    }
}

fn assignment_column(a: &ast::Assignment) -> Result<String, SqlError> {
    match &a.target {
        ast::AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        _ => Err(SqlError::Parse("unsupported assignment target".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected quoted string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    MissingAssignment(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::MissingAssignment(col) => write!(f, "missing assignment: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
