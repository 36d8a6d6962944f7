mod entries;
mod helpers;
mod profile;
mod review;
mod summary;

pub(crate) use entries::{cmd_delete, cmd_history};
pub(crate) use profile::{ProfileFields, cmd_profile_set, cmd_profile_show};
pub(crate) use review::{EditFields, cmd_add, cmd_confirm, cmd_edit, cmd_pending, cmd_recalc, cmd_skip};
pub(crate) use summary::{cmd_today, cmd_week};
