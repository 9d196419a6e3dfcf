pub mod conciliation;
pub mod deadline;
pub mod money;
pub mod payroll;
pub mod period;
pub mod statement;

pub use conciliation::{statement_net, Conciliation, ConciliationStatus};
pub use deadline::{
    classify, CoarseStatus, DeadlineError, DeadlinePolicy, DeadlineStatus, DeadlineWindow,
    Remaining, TaskClock, UrgencyTier,
};
pub use money::Money;
pub use payroll::{PayrollEntry, PayrollSummary};
pub use period::PeriodBounds;
pub use statement::{Direction, PostedDate, ReviewStatus, StatementTransaction};
