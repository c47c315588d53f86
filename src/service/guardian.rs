use crate::config::NonconformancePolicy;
use crate::db::backend::AuthBackend;
use crate::db::ddl::{Ddl, create_sequence};
use crate::db::models::{ColumnDescriptor, Extra};
use crate::db::schema::{AUTH_SCHEMA, AUTH_TABLE};
use crate::error::AuthError;
use tracing::{debug, info, warn};

/// Statements applied by `create_table` / `fix_table`, as SQL text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub created: bool,
    pub applied: Vec<String>,
}

impl RepairReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Keeps the `auth` table in line with [`AUTH_SCHEMA`].
///
/// Repairs are not transactional. MySQL commits each DDL statement on its
/// own, so a failure part-way leaves the earlier statements applied; the
/// error reports how many.
#[derive(Clone, Debug)]
pub struct SchemaGuardian<B> {
    backend: B,
    policy: NonconformancePolicy,
}

impl<B: AuthBackend> SchemaGuardian<B> {
    pub fn new(backend: B, policy: NonconformancePolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> NonconformancePolicy {
        self.policy
    }

    pub async fn table_exists(&self) -> Result<bool, AuthError> {
        let tables = self.backend.list_tables().await?;
        Ok(tables.iter().any(|t| t == AUTH_TABLE))
    }

    pub async fn describe_columns(&self) -> Result<Vec<ColumnDescriptor>, AuthError> {
        self.backend.describe_columns(AUTH_TABLE).await
    }

    /// Whether the live table conforms to [`AUTH_SCHEMA`]. Fails closed.
    ///
    /// Under [`NonconformancePolicy::DropTable`] a nonconforming table is
    /// dropped before returning `false`, together with all its rows.
    pub async fn check_conformance(&self) -> Result<bool, AuthError> {
        if !self.table_exists().await? {
            debug!(table = AUTH_TABLE, "table absent");
            return Ok(false);
        }
        let live = self.describe_columns().await?;
        if conforms(&AUTH_SCHEMA, &live) {
            debug!(table = AUTH_TABLE, "table conforms");
            return Ok(true);
        }

        warn!(
            table = AUTH_TABLE,
            live_columns = live.len(),
            "table does not conform to the expected schema"
        );
        if self.policy == NonconformancePolicy::DropTable {
            warn!(table = AUTH_TABLE, "dropping nonconforming table");
            self.backend.execute_ddl(AUTH_TABLE, &Ddl::DropTable).await?;
        }
        Ok(false)
    }

    /// Create `auth` from scratch. Fails if the table already exists.
    pub async fn create_table(&self) -> Result<RepairReport, AuthError> {
        let applied = self.apply(&create_sequence(&AUTH_SCHEMA)).await?;
        info!(table = AUTH_TABLE, "table created");
        Ok(RepairReport {
            created: true,
            applied,
        })
    }

    /// Bring the table toward [`AUTH_SCHEMA`]; creates it when absent.
    /// Running it on a conforming table applies nothing.
    pub async fn fix_table(&self) -> Result<RepairReport, AuthError> {
        if !self.table_exists().await? {
            return self.create_table().await;
        }
        let live = self.describe_columns().await?;
        let plan = plan_repair(&AUTH_SCHEMA, &live);
        let applied = self.apply(&plan).await?;
        if !applied.is_empty() {
            info!(
                table = AUTH_TABLE,
                statements = applied.len(),
                "table repaired"
            );
        }
        Ok(RepairReport {
            created: false,
            applied,
        })
    }

    /// Startup check: conformance (honoring the policy), then repair if
    /// needed. Returns the conformance after repair.
    pub async fn ensure_table(&self) -> Result<bool, AuthError> {
        if self.check_conformance().await? {
            return Ok(true);
        }
        self.fix_table().await?;
        self.check_conformance().await
    }

    async fn apply(&self, plan: &[Ddl]) -> Result<Vec<String>, AuthError> {
        let mut applied = Vec::with_capacity(plan.len());
        for ddl in plan {
            let statement = ddl.to_sql(AUTH_TABLE);
            if let Err(e) = self.backend.execute_ddl(AUTH_TABLE, ddl).await {
                warn!(
                    table = AUTH_TABLE,
                    applied = applied.len(),
                    statement = %statement,
                    error = %e,
                    "schema statement failed; manual repair required"
                );
                return Err(AuthError::repair(applied.len(), statement, e));
            }
            info!(table = AUTH_TABLE, statement = %statement, "applied schema statement");
            applied.push(statement);
        }
        Ok(applied)
    }
}

/// Every expected column is present in `live` and matches it on type,
/// nullability, default and extra. Additional live columns are allowed.
pub fn conforms(expected: &[ColumnDescriptor], live: &[ColumnDescriptor]) -> bool {
    if live.len() < expected.len() {
        return false;
    }
    expected.iter().all(|want| {
        live.iter()
            .find(|c| c.field == want.field)
            .is_some_and(|c| want.conforms(c))
    })
}

/// Statements that move `live` toward `expected`, column by column:
/// - auto-increment column with the wrong extra: drop and re-add it (MySQL
///   cannot switch auto-increment in place on a column that lost its key)
/// - missing column: add it
/// - differing type, default, nullability or extra: change it in place
///
/// Columns are never reordered and unexpected columns are left alone.
pub fn plan_repair(expected: &[ColumnDescriptor], live: &[ColumnDescriptor]) -> Vec<Ddl> {
    let mut plan = Vec::new();
    for want in expected {
        let found = live.iter().find(|c| c.field == want.field);
        match found {
            Some(have) if want.extra == Extra::AutoIncrement && have.extra != want.extra => {
                plan.push(Ddl::DropColumn {
                    column: want.field.clone(),
                });
                plan.push(Ddl::AddColumn(want.clone()));
            }
            None => plan.push(Ddl::AddColumn(want.clone())),
            Some(have) if !want.attributes_match(have) || have.extra != want.extra => {
                plan.push(Ddl::ChangeColumn(want.clone()));
            }
            Some(_) => {}
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{KeyRole, Nullability};

    fn live_schema() -> Vec<ColumnDescriptor> {
        AUTH_SCHEMA.to_vec()
    }

    #[test]
    fn identical_schema_conforms_and_needs_no_repair() {
        assert!(conforms(&AUTH_SCHEMA, &live_schema()));
        assert!(plan_repair(&AUTH_SCHEMA, &live_schema()).is_empty());
    }

    #[test]
    fn extra_live_columns_are_tolerated() {
        let mut live = live_schema();
        live.push(ColumnDescriptor {
            field: "email".into(),
            column_type: "varchar(255)".into(),
            null: Nullability::Yes,
            key: KeyRole::None,
            default: None,
            extra: Extra::None,
        });
        assert!(conforms(&AUTH_SCHEMA, &live));
        assert!(plan_repair(&AUTH_SCHEMA, &live).is_empty());
    }

    #[test]
    fn display_width_difference_conforms() {
        let mut live = live_schema();
        live[0].column_type = "int".into();
        assert!(conforms(&AUTH_SCHEMA, &live));
    }

    #[test]
    fn missing_column_fails_and_is_added() {
        let live = live_schema()[..2].to_vec();
        assert!(!conforms(&AUTH_SCHEMA, &live));
        assert_eq!(
            plan_repair(&AUTH_SCHEMA, &live),
            vec![Ddl::AddColumn(AUTH_SCHEMA[2].clone())]
        );
    }

    #[test]
    fn same_count_but_renamed_column_fails() {
        let mut live = live_schema();
        live[2].field = "passwd".into();
        assert!(!conforms(&AUTH_SCHEMA, &live));
        assert_eq!(
            plan_repair(&AUTH_SCHEMA, &live),
            vec![Ddl::AddColumn(AUTH_SCHEMA[2].clone())]
        );
    }

    #[test]
    fn lost_auto_increment_is_dropped_and_readded() {
        let mut live = live_schema();
        live[0].extra = Extra::None;
        assert!(!conforms(&AUTH_SCHEMA, &live));
        assert_eq!(
            plan_repair(&AUTH_SCHEMA, &live),
            vec![
                Ddl::DropColumn {
                    column: "order".into()
                },
                Ddl::AddColumn(AUTH_SCHEMA[0].clone()),
            ]
        );
    }

    #[test]
    fn type_and_nullability_changes_in_place() {
        let mut live = live_schema();
        live[1].column_type = "varchar(64)".into();
        live[2].null = Nullability::Yes;
        assert!(!conforms(&AUTH_SCHEMA, &live));
        assert_eq!(
            plan_repair(&AUTH_SCHEMA, &live),
            vec![
                Ddl::ChangeColumn(AUTH_SCHEMA[1].clone()),
                Ddl::ChangeColumn(AUTH_SCHEMA[2].clone()),
            ]
        );
    }

    #[test]
    fn default_mismatch_fails_and_is_changed() {
        let mut live = live_schema();
        live[1].default = Some("x".into());
        assert!(!conforms(&AUTH_SCHEMA, &live));
        assert_eq!(
            plan_repair(&AUTH_SCHEMA, &live),
            vec![Ddl::ChangeColumn(AUTH_SCHEMA[1].clone())]
        );

        let mut live = live_schema();
        live[2].default = Some(String::new().into());
        assert!(!conforms(&AUTH_SCHEMA, &live));
    }

    #[test]
    fn unexpected_extra_on_plain_column_is_changed() {
        let mut live = live_schema();
        live[1].extra = Extra::Other("on update CURRENT_TIMESTAMP".into());
        assert_eq!(
            plan_repair(&AUTH_SCHEMA, &live),
            vec![Ddl::ChangeColumn(AUTH_SCHEMA[1].clone())]
        );
    }

    #[test]
    fn key_role_alone_does_not_break_conformance() {
        let mut live = live_schema();
        live[1].key = KeyRole::Multiple;
        assert!(conforms(&AUTH_SCHEMA, &live));
    }

    #[test]
    fn empty_live_schema_fails() {
        assert!(!conforms(&AUTH_SCHEMA, &[]));
    }
}
