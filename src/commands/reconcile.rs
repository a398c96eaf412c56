use crate::args::ReconcileArgs;
use crate::commands::Out;
use crate::reconcile::{compare, load_expected, ReconcileReport};
use crate::{Config, Result};

/// Compare aggregated P&L rows against accountant-provided expected figures
/// and report the deltas. Read-only.
pub async fn reconcile(config: Config, args: ReconcileArgs) -> Result<Out<ReconcileReport>> {
    let tolerance = match args.tolerance() {
        Some(t) => t,
        None => config.tolerance_pct()?,
    };
    let expected = load_expected(args.expected())?;
    let actuals = config.db().periods_for(args.location(), args.year()).await?;
    let report = compare(args.location(), args.year(), &expected, &actuals, tolerance);
    Ok(Out::new(report.render(), report))
}
