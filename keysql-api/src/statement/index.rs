/// Index DDL: DESCRIBE LSI and the CREATE / DESCRIBE / ALTER / DROP GSI family

use super::table::{attribute_definitions, describe_row};
use super::{ddl_result, Capacity, KeyAttr};
use crate::result::{ExecResult, ResultSet};
use crate::Connection;
use keysql_core::dialect::WithOptions;
use keysql_core::table::{
    GlobalSecondaryIndexUpdate, IndexDescription, KeySchemaElement, Projection,
    ProvisionedThroughput, TableDescription, UpdateTableRequest,
};
use keysql_core::{CallContext, Error, Result};
use tracing::debug;

/// `DESCRIBE LSI idx ON t` and `DESCRIBE GSI idx ON t`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeIndex {
    pub index_name: String,
    pub table_name: String,
}

impl DescribeIndex {
    pub(crate) fn query_local(
        &self,
        conn: &Connection,
        ctx: Option<&CallContext>,
    ) -> Result<ResultSet> {
        self.query_with(conn, ctx, TableDescription::local_index)
    }

    pub(crate) fn query_global(
        &self,
        conn: &Connection,
        ctx: Option<&CallContext>,
    ) -> Result<ResultSet> {
        self.query_with(conn, ctx, TableDescription::global_index)
    }

    fn query_with(
        &self,
        conn: &Connection,
        ctx: Option<&CallContext>,
        find: for<'d> fn(&'d TableDescription, &str) -> Option<&'d IndexDescription>,
    ) -> Result<ResultSet> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        let description = conn.executor().describe_table(&ctx, &self.table_name)?;
        let rows = match find(&description, &self.index_name) {
            Some(index) => vec![describe_row(index)?],
            None => {
                debug!(table = %self.table_name, index = %self.index_name, "index not found");
                Vec::new()
            }
        };
        Ok(ResultSet::from_items(rows, None))
    }
}

/// `CREATE GSI [IF NOT EXISTS] idx ON t WITH PK=... [, WITH SK=...] ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGsi {
    pub index_name: String,
    pub table_name: String,
    pub if_not_exists: bool,
    pub pk: KeyAttr,
    pub sk: Option<KeyAttr>,
    pub capacity: Capacity,
    pub projection: Projection,
}

impl CreateGsi {
    pub(crate) fn parse(
        index_name: &str,
        table_name: &str,
        if_not_exists: bool,
        opts: &WithOptions,
    ) -> Result<Self> {
        let pk = KeyAttr::from_option(opts, "PK", "PartitionKey")?.ok_or_else(|| {
            Error::InvalidArgument(
                "no PartitionKey, specify one using WITH pk=pkname:pktype".to_string(),
            )
        })?;
        Ok(Self {
            index_name: index_name.to_string(),
            table_name: table_name.to_string(),
            if_not_exists,
            pk,
            sk: KeyAttr::from_option(opts, "SK", "SortKey")?,
            capacity: Capacity::from_options(opts)?,
            projection: Projection::from_spec(opts.first_string("PROJECTION")),
        })
    }

    pub fn request(&self) -> UpdateTableRequest {
        let mut key_schema = vec![KeySchemaElement::hash(&self.pk.name)];
        if let Some(sk) = &self.sk {
            key_schema.push(KeySchemaElement::range(&sk.name));
        }
        let mut request = UpdateTableRequest::new(&self.table_name);
        request.attribute_definitions =
            attribute_definitions(std::iter::once(&self.pk).chain(self.sk.as_ref()));
        request
            .global_secondary_index_updates
            .push(GlobalSecondaryIndexUpdate::Create {
                index_name: self.index_name.clone(),
                key_schema,
                projection: self.projection.clone(),
                provisioned_throughput: self.capacity.throughput(),
            });
        request
    }

    pub(crate) fn exec(&self, conn: &Connection, ctx: Option<&CallContext>) -> Result<ExecResult> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        debug!(table = %self.table_name, index = %self.index_name, "creating global index");
        let result = conn.executor().update_table(&ctx, &self.request());
        let if_not_exists = self.if_not_exists;
        ddl_result(
            result,
            |e| if_not_exists && e.is_already_exists(),
            "CREATE GSI",
        )
    }
}

/// `ALTER GSI idx ON t WITH RCU=..., WITH WCU=...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterGsi {
    pub index_name: String,
    pub table_name: String,
    pub throughput: ProvisionedThroughput,
}

impl AlterGsi {
    pub(crate) fn parse(index_name: &str, table_name: &str, opts: &WithOptions) -> Result<Self> {
        let throughput = Capacity::from_options(opts)?.throughput().ok_or_else(|| {
            Error::InvalidArgument(
                "ALTER GSI requires positive RCU and WCU, specify them using WITH RCU=n, WITH WCU=n"
                    .to_string(),
            )
        })?;
        Ok(Self {
            index_name: index_name.to_string(),
            table_name: table_name.to_string(),
            throughput,
        })
    }

    pub fn request(&self) -> UpdateTableRequest {
        let mut request = UpdateTableRequest::new(&self.table_name);
        request
            .global_secondary_index_updates
            .push(GlobalSecondaryIndexUpdate::Update {
                index_name: self.index_name.clone(),
                provisioned_throughput: self.throughput,
            });
        request
    }

    pub(crate) fn exec(&self, conn: &Connection, ctx: Option<&CallContext>) -> Result<ExecResult> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        debug!(table = %self.table_name, index = %self.index_name, "altering global index");
        let result = conn.executor().update_table(&ctx, &self.request());
        ddl_result(result, |_| false, "ALTER GSI")
    }
}

/// `DROP GSI [IF EXISTS] idx ON t`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropGsi {
    pub index_name: String,
    pub table_name: String,
    pub if_exists: bool,
}

impl DropGsi {
    pub fn request(&self) -> UpdateTableRequest {
        let mut request = UpdateTableRequest::new(&self.table_name);
        request
            .global_secondary_index_updates
            .push(GlobalSecondaryIndexUpdate::Delete {
                index_name: self.index_name.clone(),
            });
        request
    }

    pub(crate) fn exec(&self, conn: &Connection, ctx: Option<&CallContext>) -> Result<ExecResult> {
        let ctx = conn.ensure_context(ctx);
        ctx.check()?;
        debug!(table = %self.table_name, index = %self.index_name, "dropping global index");
        let result = conn.executor().update_table(&ctx, &self.request());
        let if_exists = self.if_exists;
        ddl_result(result, |e| if_exists && e.is_not_found(), "DROP GSI")
    }
}
