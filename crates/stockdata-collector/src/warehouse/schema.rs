//! 웨어하우스 테이블 스키마 선언과 대조.
//!
//! 테이블 스키마를 (컬럼, SQL 타입) 목록으로 선언하고, 실제 테이블과의
//! 차이를 타입으로 표현합니다. 누락 컬럼은 추가 가능하고, 타입이
//! 호환되지 않는 컬럼은 테이블이 비어 있을 때만 재생성으로 해소합니다.

use std::collections::HashMap;

/// 컬럼 선언.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
}

/// 테이블 스키마 선언.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: String,
    pub columns: &'static [ColumnDef],
    /// 자연 키 (업서트 충돌 기준)
    pub key: &'static [&'static str],
}

const PRICE_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "TICKER", sql_type: "VARCHAR(10)" },
    ColumnDef { name: "DATE", sql_type: "DATE" },
    ColumnDef { name: "OPEN", sql_type: "DOUBLE PRECISION" },
    ColumnDef { name: "HIGH", sql_type: "DOUBLE PRECISION" },
    ColumnDef { name: "LOW", sql_type: "DOUBLE PRECISION" },
    ColumnDef { name: "CLOSE", sql_type: "DOUBLE PRECISION" },
    ColumnDef { name: "ADJ_CLOSE", sql_type: "DOUBLE PRECISION" },
    ColumnDef { name: "VOLUME", sql_type: "BIGINT" },
    ColumnDef { name: "DOWNLOAD_TIMESTAMP", sql_type: "TIMESTAMPTZ" },
];

const NEWS_COLUMNS: &[ColumnDef] = &[
    ColumnDef { name: "TICKER", sql_type: "VARCHAR(10)" },
    ColumnDef { name: "ID", sql_type: "VARCHAR(64)" },
    ColumnDef { name: "TITLE", sql_type: "TEXT" },
    ColumnDef { name: "SUMMARY", sql_type: "TEXT" },
    ColumnDef { name: "DESCRIPTION", sql_type: "TEXT" },
    ColumnDef { name: "PUBLISHER", sql_type: "VARCHAR(100)" },
    ColumnDef { name: "LINK", sql_type: "TEXT" },
    ColumnDef { name: "PUBLISH_TIME", sql_type: "TIMESTAMPTZ" },
    ColumnDef { name: "DISPLAY_TIME", sql_type: "TIMESTAMPTZ" },
    ColumnDef { name: "CONTENT_TYPE", sql_type: "VARCHAR(50)" },
    ColumnDef { name: "THUMBNAIL_URL", sql_type: "TEXT" },
    ColumnDef { name: "IS_PREMIUM", sql_type: "BOOLEAN" },
    ColumnDef { name: "IS_HOSTED", sql_type: "BOOLEAN" },
    ColumnDef { name: "DOWNLOAD_TIMESTAMP", sql_type: "TIMESTAMPTZ" },
];

impl TableSchema {
    /// 가격 이력 테이블 스키마. 키: (TICKER, DATE).
    pub fn price_history(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: PRICE_COLUMNS,
            key: &["TICKER", "DATE"],
        }
    }

    /// 뉴스 테이블 스키마. 키: (TICKER, ID).
    pub fn news(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: NEWS_COLUMNS,
            key: &["TICKER", "ID"],
        }
    }

    /// 컬럼 이름 목록 (선언 순서).
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// 키에 포함되지 않는 컬럼 이름 목록.
    pub fn non_key_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|c| c.name)
            .filter(|name| !self.key.contains(name))
            .collect()
    }

    /// CREATE TABLE IF NOT EXISTS 문.
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
            self.table,
            columns.join(", "),
            self.key.join(", ")
        )
    }

    /// 키 제약 없는 스테이징 테이블 생성문.
    pub fn create_staging_sql(&self, staging_table: &str) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect();
        format!(
            "CREATE TABLE {} ({})",
            staging_table,
            columns.join(", ")
        )
    }
}

/// 선언 스키마와 실제 테이블의 차이.
#[derive(Debug, Default)]
pub struct SchemaDiff {
    /// 실제 테이블에 없는 선언 컬럼
    pub missing: Vec<ColumnDef>,
    /// 타입이 호환되지 않는 컬럼
    pub incompatible: Vec<ColumnMismatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMismatch {
    pub column: String,
    pub expected: &'static str,
    pub actual: String,
}

impl SchemaDiff {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.incompatible.is_empty()
    }
}

/// 선언 스키마를 실제 컬럼 타입 맵(대문자 컬럼명 → data_type)과 대조.
///
/// 실제 테이블에만 있는 여분 컬럼은 허용한다.
pub fn diff_schema(expected: &TableSchema, actual: &HashMap<String, String>) -> SchemaDiff {
    let mut diff = SchemaDiff::default();

    for col in expected.columns {
        match actual.get(&col.name.to_uppercase()) {
            None => diff.missing.push(*col),
            Some(actual_type) => {
                if !types_compatible(col.sql_type, actual_type) {
                    diff.incompatible.push(ColumnMismatch {
                        column: col.name.to_string(),
                        expected: col.sql_type,
                        actual: actual_type.clone(),
                    });
                }
            }
        }
    }

    diff
}

/// SQL 타입 호환성 판정.
///
/// 같은 계열(문자열, 타임스탬프, 부동소수, 정수, 불리언, 날짜)이면
/// 호환으로 본다. information_schema가 돌려주는 장황한 이름
/// ("character varying", "timestamp with time zone" 등)도 같은 계열로
/// 정규화한다.
pub fn types_compatible(expected: &str, actual: &str) -> bool {
    type_family(expected) == type_family(actual)
}

fn type_family(sql_type: &str) -> &'static str {
    // 길이 지정 제거: VARCHAR(10) → varchar
    let base = sql_type
        .split('(')
        .next()
        .unwrap_or(sql_type)
        .trim()
        .to_lowercase();
    match base.as_str() {
        "varchar" | "character varying" | "character" | "char" | "bpchar" | "text" | "string" => {
            "string"
        }
        "timestamp" | "timestamptz" | "timestamp without time zone"
        | "timestamp with time zone" => "timestamp",
        "double precision" | "float" | "float4" | "float8" | "real" | "numeric" | "decimal" => {
            "float"
        }
        "bigint" | "integer" | "smallint" | "int" | "int2" | "int4" | "int8" => "int",
        "boolean" | "bool" => "bool",
        "date" => "date",
        _ => "other",
    }
}

/// SQL 식별자로 안전한 이름인지 검사 (영숫자와 밑줄, 숫자로 시작 불가).
pub fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
