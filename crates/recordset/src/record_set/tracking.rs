//! Modification tracking: the set's structural flag plus delegation to the
//! contained records.

use crate::types::{CommitOptions, ModifiedOptions};

use super::RecordSet;

impl RecordSet {
    /// Clear the structural flag and, unless `shallow`, commit every record.
    pub fn commit(&self, options: CommitOptions) {
        let records = {
            let mut st = self.inner.state.lock();
            st.modified = false;
            if options.shallow {
                return;
            }
            st.list.clone()
        };
        for record in records {
            record.commit();
        }
    }

    /// Clear the structural flag and roll back every record.
    ///
    /// Membership and order are not restored; only record values are.
    pub fn rollback(&self) {
        let records = {
            let mut st = self.inner.state.lock();
            st.modified = false;
            st.list.clone()
        };
        for record in records {
            record.rollback();
        }
    }

    /// A structural change always counts. Otherwise, unless `shallow`, the
    /// set is modified iff some record is.
    pub fn is_modified(&self, options: ModifiedOptions) -> bool {
        let records = {
            let st = self.inner.state.lock();
            if st.modified {
                return true;
            }
            if options.shallow {
                return false;
            }
            st.list.clone()
        };
        records.iter().any(|r| r.is_modified(options))
    }
}
