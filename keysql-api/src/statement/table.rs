/// Table-level DDL: CREATE / DESCRIBE / ALTER / DROP TABLE and LIST TABLES

use super::{ddl_result, Capacity, KeyAttr};
use crate::result::{ExecResult, ResultSet};
use crate::Connection;
use keysql_core::dialect::WithOptions;
use keysql_core::table::{
    AttributeDefinition, BillingMode, CreateTableRequest, KeySchemaElement, ListTablesRequest,
    LocalSecondaryIndex, Projection, ScalarType, UpdateTableRequest,
};
use keysql_core::{AttributeValue, CallContext, Error, Item, Result};
use serde::Serialize;
use tracing::debug;

/// A local secondary index declared as `idx:field:type[:projection]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsiSpec {
    pub index_name: String,
    pub key: KeyAttr,
    pub projection: Projection,
}

impl LsiSpec {
    fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.splitn(4, ':').collect();
        let index_name = parts[0].trim();
        if index_name.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "invalid LSI definition <{}>: index name is empty",
                spec
            )));
        }
        if parts.len() < 2 {
            return Err(Error::InvalidArgument(format!(
                "invalid LSI definition <{}>, expected idx:field:type[:projection]",
                spec
            )));
        }
        let field = parts[1].trim();
        if field.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "invalid LSI definition <{}>: attribute name is empty",
                spec
            )));
        }
        let what = format!("LSI <{}>", index_name);
        let attr_type = ScalarType::parse_for(parts.get(2).copied().unwrap_or(""), &what)?;
        Ok(Self {
            index_name: index_name.to_string(),
            key: KeyAttr {
                name: field.to_string(),
                attr_type,
            },
            projection: Projection::from_spec(parts.get(3).copied().unwrap_or("")),
        })
    }
}

/// `CREATE TABLE [IF NOT EXISTS] t WITH PK=... [, WITH SK=...] ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    pub table_name: String,
    pub if_not_exists: bool,
    pub pk: KeyAttr,
    pub sk: Option<KeyAttr>,
    pub capacity: Capacity,
    pub local_indexes: Vec<LsiSpec>,
}

impl CreateTable {
    pub(crate) fn parse(table_name: &str, if_not_exists: bool, opts: &WithOptions) -> Result<Self> {
        let pk = KeyAttr::from_option(opts, "PK", "PartitionKey")?.ok_or_else(|| {
            Error::InvalidArgument(
                "no PartitionKey, specify one using WITH pk=pkname:pktype".to_string(),
            )
        })?;
        let sk = KeyAttr::from_option(opts, "SK", "SortKey")?;
        let capacity = Capacity::from_options(opts)?;
        let local_indexes = opts
            .values("LSI")
            .iter()
            .map(|spec| LsiSpec::parse(spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            table_name: table_name.to_string(),
            if_not_exists,
            pk,
            sk,
            capacity,
            local_indexes,
        })
    }

    /// The table creation request this statement sends
    pub fn request(&self) -> CreateTableRequest {
        let mut key_attrs = vec![&self.pk];
        key_attrs.extend(self.sk.as_ref());
        key_attrs.extend(self.local_indexes.iter().map(|lsi| &lsi.key));

        let mut key_schema = vec![KeySchemaElement::hash(&self.pk.name)];
        if let Some(sk) = &self.sk {
            key_schema.push(KeySchemaElement::range(&sk.name));
        }

        let local_secondary_indexes = self
            .local_indexes
            .iter()
            .map(|lsi| LocalSecondaryIndex {
                index_name: lsi.index_name.clone(),
                key_schema: vec![
                    KeySchemaElement::hash(&self.pk.name),
                    KeySchemaElement::range(&lsi.key.name),
                ],
                projection: lsi.projection.clone(),
            })
            .collect();

        CreateTableRequest {
            table_name: self.table_name.clone(),
            attribute_definitions: attribute_definitions(key_attrs),
            key_schema,
            local_secondary_indexes,
            billing_mode: billing_mode(&self.capacity),
            provisioned_throughput: self.capacity.throughput(),
        }
    }

    pub(crate) fn exec(&self, conn: &Connection, ctx: Option<&CallContext>) -> Result<ExecResult> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        debug!(table = %self.table_name, "creating table");
        let result = conn.executor().create_table(&ctx, &self.request());
        let if_not_exists = self.if_not_exists;
        ddl_result(
            result,
            |e| if_not_exists && e.is_already_exists(),
            "CREATE TABLE",
        )
    }
}

/// `DESCRIBE TABLE t`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeTable {
    pub table_name: String,
}

impl DescribeTable {
    pub(crate) fn query(&self, conn: &Connection, ctx: Option<&CallContext>) -> Result<ResultSet> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        let description = conn.executor().describe_table(&ctx, &self.table_name)?;
        Ok(ResultSet::from_items(vec![describe_row(&description)?], None))
    }
}

/// `ALTER TABLE t WITH RCU=..., WITH WCU=...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterTable {
    pub table_name: String,
    pub capacity: Capacity,
}

impl AlterTable {
    pub(crate) fn parse(table_name: &str, opts: &WithOptions) -> Result<Self> {
        Ok(Self {
            table_name: table_name.to_string(),
            capacity: Capacity::from_options(opts)?,
        })
    }

    pub fn request(&self) -> UpdateTableRequest {
        let mut request = UpdateTableRequest::new(&self.table_name);
        request.billing_mode = Some(billing_mode(&self.capacity));
        request.provisioned_throughput = self.capacity.throughput();
        request
    }

    pub(crate) fn exec(&self, conn: &Connection, ctx: Option<&CallContext>) -> Result<ExecResult> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        debug!(table = %self.table_name, capacity = ?self.capacity, "altering table");
        let result = conn.executor().update_table(&ctx, &self.request());
        ddl_result(result, |_| false, "ALTER TABLE")
    }
}

/// `DROP TABLE [IF EXISTS] t`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTable {
    pub table_name: String,
    pub if_exists: bool,
}

impl DropTable {
    pub(crate) fn exec(&self, conn: &Connection, ctx: Option<&CallContext>) -> Result<ExecResult> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        debug!(table = %self.table_name, "dropping table");
        let result = conn.executor().delete_table(&ctx, &self.table_name);
        let if_exists = self.if_exists;
        ddl_result(result, |e| if_exists && e.is_not_found(), "DROP TABLE")
    }
}

/// `LIST TABLES`: one `$1` column, paginated by the listing's own token.
pub(crate) fn list_tables(conn: &Connection, ctx: Option<&CallContext>) -> Result<ResultSet> {
    let call_ctx = conn.ensure_context(ctx);
    call_ctx.check()?;
    let request = ListTablesRequest::default();
    let output = conn.executor().list_tables(&call_ctx, &request)?;
    Ok(ResultSet::from_table_list(
        conn.executor().clone(),
        ctx.cloned(),
        conn.timeout(),
        request,
        output,
    ))
}

/// Attribute definitions for the given keys, first declaration of a name wins.
pub(crate) fn attribute_definitions<'a>(
    keys: impl IntoIterator<Item = &'a KeyAttr>,
) -> Vec<AttributeDefinition> {
    let mut defs: Vec<AttributeDefinition> = Vec::new();
    for key in keys {
        if defs.iter().any(|d| d.attribute_name == key.name) {
            continue;
        }
        defs.push(AttributeDefinition::new(&key.name, key.attr_type));
    }
    defs
}

fn billing_mode(capacity: &Capacity) -> BillingMode {
    match capacity {
        Capacity::OnDemand => BillingMode::PayPerRequest,
        Capacity::Provisioned(_) => BillingMode::Provisioned,
    }
}

/// A description rendered as one row: one column per top-level field.
pub(crate) fn describe_row<T: Serialize>(description: &T) -> Result<Item> {
    let json = serde_json::to_value(description)
        .map_err(|e| Error::Codec(format!("cannot render description: {}", e)))?;
    match json {
        serde_json::Value::Object(fields) => Ok(fields
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
            .collect()),
        other => Err(Error::Codec(format!(
            "description rendered as {}, expected an object",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keysql_core::table::{KeyType, ProjectionType};

    fn opts(fragment: &str) -> WithOptions {
        WithOptions::parse(fragment)
    }

    #[test]
    fn test_create_table_requires_pk() {
        let err = CreateTable::parse("t", false, &opts(" WITH SK=ts:number")).unwrap_err();
        assert!(err.to_string().contains("no PartitionKey"));
    }

    #[test]
    fn test_create_table_request_shape() {
        let create = CreateTable::parse(
            "orders",
            false,
            &opts(
                " WITH PK=customer:string, WITH SK=placed:number, WITH LSI=by_total:total:number:*, \
                 WITH LSI=by_state:state:string:status,notes, WITH LSI=by_placed:placed:string",
            ),
        )
        .unwrap();
        let request = create.request();

        assert_eq!(request.billing_mode, BillingMode::PayPerRequest);
        assert!(request.provisioned_throughput.is_none());
        assert_eq!(request.key_schema[0], KeySchemaElement::hash("customer"));
        assert_eq!(request.key_schema[1], KeySchemaElement::range("placed"));

        let names: Vec<_> = request
            .local_secondary_indexes
            .iter()
            .map(|i| i.index_name.as_str())
            .collect();
        assert_eq!(names, vec!["by_total", "by_state", "by_placed"]);

        let by_total = &request.local_secondary_indexes[0];
        assert_eq!(by_total.key_schema[0].key_type, KeyType::Hash);
        assert_eq!(by_total.key_schema[0].attribute_name, "customer");
        assert_eq!(by_total.key_schema[1].attribute_name, "total");
        assert_eq!(by_total.projection.projection_type, ProjectionType::All);

        let by_state = &request.local_secondary_indexes[1];
        assert_eq!(by_state.projection.projection_type, ProjectionType::Include);
        assert_eq!(by_state.projection.non_key_attributes, vec!["status", "notes"]);

        let by_placed = &request.local_secondary_indexes[2];
        assert_eq!(by_placed.projection.projection_type, ProjectionType::KeysOnly);

        let defs: Vec<_> = request
            .attribute_definitions
            .iter()
            .map(|d| (d.attribute_name.as_str(), d.attribute_type))
            .collect();
        assert_eq!(
            defs,
            vec![
                ("customer", ScalarType::String),
                ("placed", ScalarType::Number),
                ("total", ScalarType::Number),
                ("state", ScalarType::String),
            ]
        );
    }

    #[test]
    fn test_lsi_errors() {
        let err = CreateTable::parse("t", false, &opts(" WITH PK=id:string, WITH LSI=:f:string"))
            .unwrap_err();
        assert!(err.to_string().contains("index name is empty"));

        let err = CreateTable::parse("t", false, &opts(" WITH PK=id:string, WITH LSI=idx:f:bool"))
            .unwrap_err();
        assert!(err.to_string().contains("LSI <idx>"));

        let err = CreateTable::parse("t", false, &opts(" WITH PK=id:string, WITH LSI=idx"))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_alter_table_billing() {
        let on_demand = AlterTable::parse("t", &opts("")).unwrap().request();
        assert_eq!(on_demand.billing_mode, Some(BillingMode::PayPerRequest));
        assert!(on_demand.provisioned_throughput.is_none());

        let provisioned = AlterTable::parse("t", &opts(" WITH RCU=5, WITH WCU=7"))
            .unwrap()
            .request();
        assert_eq!(provisioned.billing_mode, Some(BillingMode::Provisioned));
        assert_eq!(
            provisioned.provisioned_throughput.unwrap().write_capacity_units,
            7
        );
    }

    #[test]
    fn test_describe_row_uses_top_level_fields() {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Desc {
            table_name: String,
            item_count: i64,
        }
        let row = describe_row(&Desc {
            table_name: "t".into(),
            item_count: 3,
        })
        .unwrap();
        assert_eq!(row.get("TableName"), Some(&AttributeValue::string("t")));
        assert_eq!(row.get("ItemCount"), Some(&AttributeValue::number(3)));
    }
}
