//! Callback identifiers carried by inline buttons.
//!
//! Catalog entries are addressed by index (`brand_{b}`, `model_{b}_{m}`,
//! `variant_{b}_{m}_{v}`) because Telegram caps callback data at 64 bytes.

use crate::settings::AdminRole as Role;
use crate::spreadsheet::Niche;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    MainMenu,
    Prices,
    Estimate,
    MobileList,
    Search,
    Support,
    Brand(usize),
    Model(usize, usize),
    Variant(usize, usize, usize),
    Year(i32),
    Paint(usize),
    MobileBrand(usize),
    MobileModel(usize, usize),
    SearchHitCar(usize, usize, usize),
    SearchHitMobile(usize, usize),
    AdminHome,
    AdminMenus,
    EditMenu(String),
    MenuToggle(String),
    MenuSetLabel(String),
    MenuSetUrl(String),
    ChannelSettings,
    ChannelToggle,
    ChannelSetUrl,
    AiSettings,
    AiCycleSource,
    AiToggleKillSwitch,
    AiTogglePriority,
    AiUpdate,
    AiUpdateStart,
    UpdateSpreadsheet,
    Upload(Niche),
    AddCar,
    SetSupport,
    SupportInbox,
    ManageAdmins,
    AddAdmin,
    AdminRole(Role),
    AdminRemove(i64),
    SponsorMenu,
    SponsorSet,
    SponsorClear,
    BackupMenu,
    BackupNow,
    BackupSet(u32),
    BackupRestore,
    BroadcastMenu,
    BroadcastAll,
    BroadcastActive,
    BroadcastScheduled,
}

fn indices<const N: usize>(rest: &str) -> Option<[usize; N]> {
    let mut parsed = [0; N];
    let mut parts = rest.split('_');
    for slot in parsed.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    parts.next().is_none().then_some(parsed)
}

impl CallbackAction {
    /// Parse a callback identifier; `None` for anything unknown or malformed
    pub fn parse(data: &str) -> Option<Self> {
        use CallbackAction::*;

        let exact = match data {
            "main_menu" => Some(MainMenu),
            "menu_prices" => Some(Prices),
            "menu_estimate" => Some(Estimate),
            "menu_mobile_list" => Some(MobileList),
            "menu_search" => Some(Search),
            "menu_support" => Some(Support),
            "admin_home" => Some(AdminHome),
            "admin_menus" => Some(AdminMenus),
            "admin_channel_settings" => Some(ChannelSettings),
            "channel_toggle" => Some(ChannelToggle),
            "channel_set_url" => Some(ChannelSetUrl),
            "admin_ai_settings" => Some(AiSettings),
            "ai_cycle_source" => Some(AiCycleSource),
            "ai_toggle_kill" => Some(AiToggleKillSwitch),
            "ai_toggle_priority" => Some(AiTogglePriority),
            "admin_ai_update" => Some(AiUpdate),
            "admin_ai_update_start" => Some(AiUpdateStart),
            "admin_update_excel" => Some(UpdateSpreadsheet),
            "admin_add_car" => Some(AddCar),
            "admin_set_support" => Some(SetSupport),
            "admin_support_inbox" => Some(SupportInbox),
            "admin_manage_admins" => Some(ManageAdmins),
            "admin_add_new_admin" => Some(AddAdmin),
            "admin_set_sponsor" => Some(SponsorMenu),
            "sponsor_set" => Some(SponsorSet),
            "sponsor_clear" => Some(SponsorClear),
            "admin_backup_menu" => Some(BackupMenu),
            "backup_get_now" => Some(BackupNow),
            "backup_off" => Some(BackupSet(0)),
            "backup_restore" => Some(BackupRestore),
            "admin_broadcast" => Some(BroadcastMenu),
            "bcast_all" => Some(BroadcastAll),
            "bcast_active" => Some(BroadcastActive),
            "bcast_schedule" => Some(BroadcastScheduled),
            _ => None,
        };
        if exact.is_some() {
            return exact;
        }

        if let Some(rest) = data.strip_prefix("mob_brand_") {
            let [b] = indices(rest)?;
            Some(MobileBrand(b))
        } else if let Some(rest) = data.strip_prefix("mob_model_") {
            let [b, m] = indices(rest)?;
            Some(MobileModel(b, m))
        } else if let Some(rest) = data.strip_prefix("search_hit_c_") {
            let [b, m, v] = indices(rest)?;
            Some(SearchHitCar(b, m, v))
        } else if let Some(rest) = data.strip_prefix("search_hit_m_") {
            let [b, m] = indices(rest)?;
            Some(SearchHitMobile(b, m))
        } else if let Some(rest) = data.strip_prefix("brand_") {
            let [b] = indices(rest)?;
            Some(Brand(b))
        } else if let Some(rest) = data.strip_prefix("model_") {
            let [b, m] = indices(rest)?;
            Some(Model(b, m))
        } else if let Some(rest) = data.strip_prefix("variant_") {
            let [b, m, v] = indices(rest)?;
            Some(Variant(b, m, v))
        } else if let Some(rest) = data.strip_prefix("year_") {
            rest.parse().ok().map(Year)
        } else if let Some(rest) = data.strip_prefix("paint_") {
            rest.parse().ok().map(Paint)
        } else if let Some(key) = data.strip_prefix("edit_menu_") {
            Some(EditMenu(key.to_string()))
        } else if let Some(key) = data.strip_prefix("menu_toggle_") {
            Some(MenuToggle(key.to_string()))
        } else if let Some(key) = data.strip_prefix("menu_set_label_") {
            Some(MenuSetLabel(key.to_string()))
        } else if let Some(key) = data.strip_prefix("menu_set_url_") {
            Some(MenuSetUrl(key.to_string()))
        } else if let Some(role) = data.strip_prefix("admin_role_") {
            Role::parse(role).map(Self::AdminRole)
        } else if let Some(id) = data.strip_prefix("admin_remove_") {
            id.parse().ok().map(AdminRemove)
        } else if let Some(hours) = data.strip_prefix("backup_set_") {
            hours.strip_suffix('h')?.parse().ok().map(BackupSet)
        } else if let Some(niche) = data.strip_prefix("upload_") {
            Niche::parse(niche).map(Upload)
        } else {
            None
        }
    }

    /// The identifier to put on a button
    pub fn data(&self) -> String {
        use CallbackAction::*;

        match self {
            MainMenu => "main_menu".into(),
            Prices => "menu_prices".into(),
            Estimate => "menu_estimate".into(),
            MobileList => "menu_mobile_list".into(),
            Search => "menu_search".into(),
            Support => "menu_support".into(),
            Brand(b) => format!("brand_{b}"),
            Model(b, m) => format!("model_{b}_{m}"),
            Variant(b, m, v) => format!("variant_{b}_{m}_{v}"),
            Year(y) => format!("year_{y}"),
            Paint(i) => format!("paint_{i}"),
            MobileBrand(b) => format!("mob_brand_{b}"),
            MobileModel(b, m) => format!("mob_model_{b}_{m}"),
            SearchHitCar(b, m, v) => format!("search_hit_c_{b}_{m}_{v}"),
            SearchHitMobile(b, m) => format!("search_hit_m_{b}_{m}"),
            AdminHome => "admin_home".into(),
            AdminMenus => "admin_menus".into(),
            EditMenu(key) => format!("edit_menu_{key}"),
            MenuToggle(key) => format!("menu_toggle_{key}"),
            MenuSetLabel(key) => format!("menu_set_label_{key}"),
            MenuSetUrl(key) => format!("menu_set_url_{key}"),
            ChannelSettings => "admin_channel_settings".into(),
            ChannelToggle => "channel_toggle".into(),
            ChannelSetUrl => "channel_set_url".into(),
            AiSettings => "admin_ai_settings".into(),
            AiCycleSource => "ai_cycle_source".into(),
            AiToggleKillSwitch => "ai_toggle_kill".into(),
            AiTogglePriority => "ai_toggle_priority".into(),
            AiUpdate => "admin_ai_update".into(),
            AiUpdateStart => "admin_ai_update_start".into(),
            UpdateSpreadsheet => "admin_update_excel".into(),
            Upload(niche) => format!("upload_{}", niche.as_str()),
            AddCar => "admin_add_car".into(),
            SetSupport => "admin_set_support".into(),
            SupportInbox => "admin_support_inbox".into(),
            ManageAdmins => "admin_manage_admins".into(),
            AddAdmin => "admin_add_new_admin".into(),
            Self::AdminRole(role) => format!("admin_role_{}", role.as_str()),
            AdminRemove(id) => format!("admin_remove_{id}"),
            SponsorMenu => "admin_set_sponsor".into(),
            SponsorSet => "sponsor_set".into(),
            SponsorClear => "sponsor_clear".into(),
            BackupMenu => "admin_backup_menu".into(),
            BackupNow => "backup_get_now".into(),
            BackupSet(0) => "backup_off".into(),
            BackupSet(hours) => format!("backup_set_{hours}h"),
            BackupRestore => "backup_restore".into(),
            BroadcastMenu => "admin_broadcast".into(),
            BroadcastAll => "bcast_all".into(),
            BroadcastActive => "bcast_active".into(),
            BroadcastScheduled => "bcast_schedule".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_do_not_shadow_each_other() {
        assert_eq!(
            CallbackAction::parse("mob_brand_2"),
            Some(CallbackAction::MobileBrand(2))
        );
        assert_eq!(
            CallbackAction::parse("brand_2"),
            Some(CallbackAction::Brand(2))
        );
        assert_eq!(
            CallbackAction::parse("menu_toggle_search"),
            Some(CallbackAction::MenuToggle("search".to_string()))
        );
        assert_eq!(
            CallbackAction::parse("menu_search"),
            Some(CallbackAction::Search)
        );
    }

    #[test]
    fn test_backup_intervals() {
        assert_eq!(
            CallbackAction::parse("backup_set_24h"),
            Some(CallbackAction::BackupSet(24))
        );
        assert_eq!(
            CallbackAction::parse("backup_off"),
            Some(CallbackAction::BackupSet(0))
        );
        assert_eq!(CallbackAction::BackupSet(1).data(), "backup_set_1h");
    }

    #[test]
    fn test_malformed_identifiers() {
        assert_eq!(CallbackAction::parse("brand_x"), None);
        assert_eq!(CallbackAction::parse("model_1"), None);
        assert_eq!(CallbackAction::parse("variant_1_2_3_4"), None);
        assert_eq!(CallbackAction::parse("admin_role_owner"), None);
        assert_eq!(CallbackAction::parse("something_else"), None);
    }

    #[test]
    fn test_identifiers_fit_telegram_limit() {
        let action = CallbackAction::SearchHitCar(999, 999, 999);
        assert_eq!(CallbackAction::parse(&action.data()), Some(action.clone()));
        assert!(action.data().len() <= 64);
    }
}
