#![allow(dead_code)]

pub mod mysql;
pub mod recorder;

pub use mysql::with_mysql_harness;
pub use recorder::RecordingExecutor;

use condsql::TableDescriptor;

/// `t_task` as the task board stores it.
pub fn tasks() -> TableDescriptor {
    condsql::table_descriptor!(tasks (ID) {
        ID, name, priority, detail, status, create_time, update_time, employee, problems
    })
    .expect("tasks descriptor should be valid")
}
