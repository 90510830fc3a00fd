//! UI Builder module for creating keyboards and formatting messages
//!
//! Keyboards are built as plain [`ButtonRows`] so the dialogue engine stays
//! independent of Telegram types; [`to_keyboard`] converts them at the edge.

use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use tracing::warn;

use crate::catalog::SearchHit;
use crate::estimate::PAINT_CONDITIONS;
use crate::localization::t_lang;
use crate::menu::{self, MenuConfig, MenuEntry, MenuKind};
use crate::models::{ButtonAction, ButtonRows, CarBrand, CarDatabase, CarModel, InlineButton};
use crate::models::{MobileBrand, MobileDatabase};
use crate::settings::{AdminRole, Permission, Sponsor, SupportConfig, SupportMode};

use super::callback_data::CallbackAction;

/// Arrange buttons into rows of `per_row`
pub fn grid(buttons: Vec<InlineButton>, per_row: usize) -> ButtonRows {
    buttons
        .chunks(per_row.max(1))
        .map(|row| row.to_vec())
        .collect()
}

fn button(label: impl Into<String>, action: CallbackAction) -> InlineButton {
    InlineButton::callback(label, action.data())
}

/// Single "back to main menu" row
pub fn main_menu_row(lang: &str) -> Vec<InlineButton> {
    vec![button(t_lang("btn-main-menu", lang), CallbackAction::MainMenu)]
}

/// A back button to `target` next to the main menu button
pub fn back_rows(target: CallbackAction, lang: &str) -> ButtonRows {
    vec![vec![
        button(t_lang("btn-back", lang), target),
        button(t_lang("btn-main-menu", lang), CallbackAction::MainMenu),
    ]]
}

fn entry_button(key: &str, entry: &MenuEntry) -> Option<InlineButton> {
    match entry.kind {
        MenuKind::WebApp => entry
            .url
            .as_deref()
            .map(|url| InlineButton::web_app(&entry.label, url)),
        MenuKind::Link => entry
            .url
            .as_deref()
            .map(|url| InlineButton::url(&entry.label, url)),
        MenuKind::Internal | MenuKind::Dynamic => {
            let action = match key {
                menu::PRICES => CallbackAction::Prices,
                menu::ESTIMATE => CallbackAction::Estimate,
                menu::MOBILE_LIST => CallbackAction::MobileList,
                menu::SEARCH => CallbackAction::Search,
                menu::SUPPORT => CallbackAction::Support,
                _ => return None,
            };
            Some(button(&entry.label, action))
        }
    }
}

/// Main menu options
pub struct MainMenuOptions<'a> {
    pub menu: &'a MenuConfig,
    pub support: &'a SupportConfig,
    pub sponsor: Option<&'a Sponsor>,
    pub role: Option<AdminRole>,
    /// Show the quick AI update button (admin with a configured provider)
    pub show_ai_update: bool,
}

/// Build the main menu from the menu configuration. Inactive entries are
/// left out and empty rows dropped.
pub fn main_menu(options: &MainMenuOptions<'_>, lang: &str) -> ButtonRows {
    let entry = |key: &str| {
        options
            .menu
            .active(key)
            .and_then(|entry| entry_button(key, entry))
    };

    let support = options.menu.active(menu::SUPPORT).map(|entry| {
        match options.support.mode {
            SupportMode::Link => InlineButton::url(&entry.label, &options.support.value),
            SupportMode::Text => button(&entry.label, CallbackAction::Support),
        }
    });

    let mut rows: ButtonRows = vec![
        [entry(menu::CALC), entry(menu::MARKET)].into_iter().flatten().collect(),
        [entry(menu::PRICES), entry(menu::ESTIMATE)].into_iter().flatten().collect(),
        [entry(menu::MOBILE_WEBAPP), entry(menu::MOBILE_LIST)]
            .into_iter()
            .flatten()
            .collect(),
        [entry(menu::SEARCH), support].into_iter().flatten().collect(),
    ];

    if let Some(role) = options.role {
        let mut admin_row = vec![button(t_lang("btn-admin-panel", lang), CallbackAction::AdminHome)];
        if options.show_ai_update && role.allows(Permission::AiUpdate) {
            admin_row.push(button(t_lang("btn-ai-update", lang), CallbackAction::AiUpdate));
        }
        rows.push(admin_row);
    }

    let mut footer: Vec<InlineButton> = entry(menu::CHANNEL).into_iter().collect();
    if let Some(sponsor) = options.sponsor {
        footer.push(InlineButton::url(format!("⭐ {}", sponsor.name), &sponsor.url));
    }
    rows.push(footer);

    rows.retain(|row| !row.is_empty());
    rows
}

pub fn car_brands_keyboard(cars: &CarDatabase, lang: &str) -> ButtonRows {
    let buttons = cars
        .brands
        .values()
        .enumerate()
        .map(|(b, brand)| button(&brand.name, CallbackAction::Brand(b)))
        .collect();
    let mut rows = grid(buttons, 2);
    rows.push(main_menu_row(lang));
    rows
}

/// Models of one brand; `back` returns to the brand list of the current flow
pub fn car_models_keyboard(
    brand_index: usize,
    brand: &CarBrand,
    back: CallbackAction,
    lang: &str,
) -> ButtonRows {
    let buttons = brand
        .models
        .iter()
        .enumerate()
        .map(|(m, model)| button(&model.name, CallbackAction::Model(brand_index, m)))
        .collect();
    let mut rows = grid(buttons, 2);
    rows.extend(back_rows(back, lang));
    rows
}

pub fn car_variants_keyboard(
    brand_index: usize,
    model_index: usize,
    model: &CarModel,
    lang: &str,
) -> ButtonRows {
    let mut rows: ButtonRows = model
        .variants
        .iter()
        .enumerate()
        .map(|(v, variant)| {
            vec![button(
                &variant.name,
                CallbackAction::Variant(brand_index, model_index, v),
            )]
        })
        .collect();
    rows.extend(back_rows(CallbackAction::Brand(brand_index), lang));
    rows
}

/// Model year grid, three per row
pub fn year_keyboard(years: &[i32], lang: &str) -> ButtonRows {
    let buttons = years
        .iter()
        .map(|year| button(year.to_string(), CallbackAction::Year(*year)))
        .collect();
    let mut rows = grid(buttons, 3);
    rows.push(main_menu_row(lang));
    rows
}

/// Body condition grid, two per row
pub fn paint_keyboard(lang: &str) -> ButtonRows {
    let buttons = PAINT_CONDITIONS
        .iter()
        .enumerate()
        .map(|(i, condition)| button(t_lang(condition.key, lang), CallbackAction::Paint(i)))
        .collect();
    let mut rows = grid(buttons, 2);
    rows.push(main_menu_row(lang));
    rows
}

pub fn mobile_brands_keyboard(mobiles: &MobileDatabase, lang: &str) -> ButtonRows {
    let buttons = mobiles
        .brands
        .values()
        .enumerate()
        .map(|(b, brand)| button(&brand.name, CallbackAction::MobileBrand(b)))
        .collect();
    let mut rows = grid(buttons, 2);
    rows.push(main_menu_row(lang));
    rows
}

pub fn mobile_models_keyboard(brand_index: usize, brand: &MobileBrand, lang: &str) -> ButtonRows {
    let mut rows: ButtonRows = brand
        .models
        .iter()
        .enumerate()
        .map(|(m, model)| {
            let label = format!("{} {}", model.name, model.storage).trim().to_string();
            vec![button(label, CallbackAction::MobileModel(brand_index, m))]
        })
        .collect();
    rows.extend(back_rows(CallbackAction::MobileList, lang));
    rows
}

pub fn search_results_keyboard(hits: &[SearchHit], lang: &str) -> ButtonRows {
    let mut rows: ButtonRows = hits
        .iter()
        .map(|hit| {
            let action = match *hit {
                SearchHit::Car {
                    brand,
                    model,
                    variant,
                    ..
                } => CallbackAction::SearchHitCar(brand, model, variant),
                SearchHit::Mobile { brand, model, .. } => {
                    CallbackAction::SearchHitMobile(brand, model)
                }
            };
            vec![button(hit.label(), action)]
        })
        .collect();
    rows.push(main_menu_row(lang));
    rows
}

/// Admin panel entries and the permission each one needs
const ADMIN_PANEL: [(&str, CallbackAction, Permission); 12] = [
    ("admin-btn-menus", CallbackAction::AdminMenus, Permission::MenuEditing),
    ("admin-btn-channel", CallbackAction::ChannelSettings, Permission::Channel),
    ("admin-btn-ai-settings", CallbackAction::AiSettings, Permission::AiSettings),
    ("admin-btn-ai-update", CallbackAction::AiUpdate, Permission::AiUpdate),
    ("admin-btn-spreadsheet", CallbackAction::UpdateSpreadsheet, Permission::Spreadsheet),
    ("admin-btn-add-car", CallbackAction::AddCar, Permission::AddCar),
    ("admin-btn-support", CallbackAction::SetSupport, Permission::SupportConfig),
    ("admin-btn-inbox", CallbackAction::SupportInbox, Permission::SupportConfig),
    ("admin-btn-admins", CallbackAction::ManageAdmins, Permission::ManageAdmins),
    ("admin-btn-sponsor", CallbackAction::SponsorMenu, Permission::Sponsor),
    ("admin-btn-backup", CallbackAction::BackupMenu, Permission::Backup),
    ("admin-btn-broadcast", CallbackAction::BroadcastMenu, Permission::Broadcast),
];

/// Admin panel restricted to what `role` may do
pub fn admin_panel_keyboard(role: AdminRole, lang: &str) -> ButtonRows {
    let buttons = ADMIN_PANEL
        .iter()
        .filter(|(_, _, permission)| role.allows(*permission))
        .map(|(key, action, _)| button(t_lang(key, lang), action.clone()))
        .collect();
    let mut rows = grid(buttons, 2);
    rows.push(main_menu_row(lang));
    rows
}

/// Every menu entry with its visibility, for the menu editor
pub fn menu_editor_keyboard(menu: &MenuConfig, lang: &str) -> ButtonRows {
    let mut rows: ButtonRows = menu
        .ordered()
        .into_iter()
        .map(|(key, entry)| {
            let status = if entry.active { "✅" } else { "❌" };
            vec![button(
                format!("{status} {}", entry.label),
                CallbackAction::EditMenu(key.to_string()),
            )]
        })
        .collect();
    rows.extend(back_rows(CallbackAction::AdminHome, lang));
    rows
}

pub fn menu_entry_keyboard(key: &str, entry: &MenuEntry, lang: &str) -> ButtonRows {
    let toggle_key = if entry.active { "btn-disable" } else { "btn-enable" };
    let mut rows = vec![
        vec![button(
            t_lang(toggle_key, lang),
            CallbackAction::MenuToggle(key.to_string()),
        )],
        vec![button(
            t_lang("btn-set-label", lang),
            CallbackAction::MenuSetLabel(key.to_string()),
        )],
    ];
    if entry.has_url() {
        rows.push(vec![button(
            t_lang("btn-set-url", lang),
            CallbackAction::MenuSetUrl(key.to_string()),
        )]);
    }
    rows.extend(back_rows(CallbackAction::AdminMenus, lang));
    rows
}

/// Convert button rows into a Telegram keyboard. Buttons whose URL does not
/// parse are skipped.
pub fn to_keyboard(rows: &ButtonRows) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .map(|row| row.iter().filter_map(to_telegram_button).collect::<Vec<_>>())
        .filter(|row: &Vec<InlineKeyboardButton>| !row.is_empty())
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn to_telegram_button(button: &InlineButton) -> Option<InlineKeyboardButton> {
    match &button.action {
        ButtonAction::Callback(data) => Some(InlineKeyboardButton::callback(
            button.label.clone(),
            data.clone(),
        )),
        ButtonAction::Url(url) => match Url::parse(url) {
            Ok(url) => Some(InlineKeyboardButton::url(button.label.clone(), url)),
            Err(e) => {
                warn!(label = %button.label, url = %url, error = %e, "Skipping button with invalid URL");
                None
            }
        },
        ButtonAction::WebApp(url) => match Url::parse(url) {
            Ok(url) => Some(InlineKeyboardButton::web_app(
                button.label.clone(),
                WebAppInfo { url },
            )),
            Err(e) => {
                warn!(label = %button.label, url = %url, error = %e, "Skipping web app button with invalid URL");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callbacks(rows: &ButtonRows) -> Vec<String> {
        rows.iter()
            .flatten()
            .filter_map(|b| b.callback_data().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_grid_layout() {
        let buttons: Vec<InlineButton> = (0..5)
            .map(|i| InlineButton::callback(i.to_string(), format!("year_{i}")))
            .collect();
        let rows = grid(buttons, 3);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn test_editor_panel_is_restricted() {
        let data = callbacks(&admin_panel_keyboard(AdminRole::Editor, "en"));
        assert!(data.contains(&"admin_update_excel".to_string()));
        assert!(data.contains(&"admin_add_car".to_string()));
        assert!(!data.contains(&"admin_backup_menu".to_string()));
        assert!(!data.contains(&"admin_manage_admins".to_string()));
    }

    #[test]
    fn test_invalid_urls_are_skipped() {
        let rows = vec![vec![
            InlineButton::url("bad", "not a url"),
            InlineButton::callback("ok", "main_menu"),
        ]];
        let keyboard = to_keyboard(&rows);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);
    }
}
