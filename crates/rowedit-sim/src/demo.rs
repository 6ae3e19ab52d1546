//! Role column walkthrough
//!
//! u1 starts at `read`, is promoted to `write` through a successful commit,
//! then gets `admin` staged and cancelled.

use rowedit_core::catalog::legacy::parse_role_catalog;
use rowedit_core::{
    ControllerConfig, EditSessionController, MemberId, RoleId, RowView, ValueCatalog,
};

const ROLES_PAYLOAD: &str = r#"{"roles": ["read", "triage", "write", "maintain", "admin"]}"#;

/// One printed line of the walkthrough
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoStep {
    pub action: String,
    pub view: RowView<RoleId>,
}

impl std::fmt::Display for DemoStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<24} base={:<6} effective={:<6} status={:?}",
            self.action,
            self.view.base.as_str(),
            self.view.effective.as_str(),
            self.view.status
        )
    }
}

fn snapshot(
    controller: &EditSessionController<MemberId, RoleId>,
    member: &MemberId,
    action: String,
) -> anyhow::Result<DemoStep> {
    let view = controller
        .row(member)
        .ok_or_else(|| anyhow::anyhow!("row {member} missing"))?;
    Ok(DemoStep { action, view })
}

fn label(catalog: &ValueCatalog<RoleId>, role: &str) -> String {
    catalog.label_for(&RoleId::from(role))
}

/// Run the walkthrough, returning every step
pub async fn run_demo() -> anyhow::Result<Vec<DemoStep>> {
    let catalog = parse_role_catalog(ROLES_PAYLOAD)?;
    let controller = EditSessionController::with_rows(
        ControllerConfig::new(),
        vec![
            (MemberId::from("u1"), RoleId::from("read")),
            (MemberId::from("u2"), RoleId::from("admin")),
        ],
    );
    let member = MemberId::from("u1");
    let mut steps = vec![snapshot(&controller, &member, "loaded".to_string())?];

    controller.stage(&member, RoleId::from("write"))?;
    steps.push(snapshot(
        &controller,
        &member,
        format!("stage {}", label(&catalog, "write")),
    )?);

    controller
        .commit(&member, |id, role| async move {
            tracing::info!(member = %id, role = %role, "role assigned");
            Ok(())
        })
        .await?;
    steps.push(snapshot(&controller, &member, "commit".to_string())?);

    controller.stage(&member, RoleId::from("admin"))?;
    steps.push(snapshot(
        &controller,
        &member,
        format!("stage {}", label(&catalog, "admin")),
    )?);

    controller.cancel(&member)?;
    steps.push(snapshot(&controller, &member, "cancel".to_string())?);

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowedit_core::RowStatus;

    #[tokio::test]
    async fn walkthrough_ends_clean_on_write() {
        let steps = run_demo().await.unwrap();
        let effective: Vec<&str> = steps.iter().map(|s| s.view.effective.as_str()).collect();
        assert_eq!(effective, vec!["read", "write", "write", "admin", "write"]);

        let last = steps.last().unwrap();
        assert_eq!(last.view.base, RoleId::from("write"));
        assert_eq!(last.view.status, RowStatus::Clean);
        assert_eq!(steps[1].action, "stage Write");
        assert_eq!(steps[1].view.status, RowStatus::Pending);
    }
}
