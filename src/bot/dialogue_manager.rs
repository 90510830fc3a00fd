//! Dialogue Manager module: the conversation state machine
//!
//! Every entry point takes the current [`DialogueState`] and the stored
//! [`BotData`], applies any change in place and returns an [`Outcome`]: the
//! replies to show, the next state and the side effects the Telegram layer
//! must run. Nothing here talks to Telegram, which keeps every flow testable.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::{format_jalali, parse_schedule};
use crate::catalog::{
    format_price, render_price_list, search, PriceSource, MAX_MESSAGE_CHARS, MAX_SEARCH_HITS,
};
use crate::dialogue::{
    parse_price, parse_user_id, validate_name, validate_url, DialogueState, PendingInput,
};
use crate::estimate::{estimate_price, market_floor, parse_mileage, recent_years, PAINT_CONDITIONS};
use crate::localization::{t_args_lang, t_lang};
use crate::menu::{self, MenuEntry};
use crate::models::{
    ButtonRows, CarBrand, CarDatabase, CarModel, CarVariant, ChatMessage, InlineButton,
    MobileModel,
};
use crate::settings::{AdminRole, Permission, Priority, Sponsor, SupportConfig, SupportMode};
use crate::spreadsheet::{import_workbook, Niche};
use crate::store::{Audience, BotData, ScheduledBroadcast};

use super::callback_data::CallbackAction;
use super::ui_builder::{self, back_rows, main_menu_row, MainMenuOptions};
use super::Command;

/// Support inbox entries shown to admins
const INBOX_PREVIEW: usize = 10;

/// Who is talking and when
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub user_id: i64,
    pub owner_id: i64,
    /// Resolved locale code
    pub lang: String,
    pub now: DateTime<Utc>,
    /// Current Jalali year
    pub current_year: i32,
    /// Whether the selected AI provider has an API key
    pub ai_configured: bool,
    pub tz_offset: FixedOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Replace the message that carried the pressed button
    Edit,
    /// Send a new message
    Send,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub buttons: ButtonRows,
    pub mode: ReplyMode,
}

/// Work the Telegram layer runs after replying
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RefreshAiPrices,
    SendBackup,
    Broadcast { audience: Audience, text: String },
    ForwardToSupport { text: String },
    RestartBackupJob,
    RestartPriceJob,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub replies: Vec<Reply>,
    /// `None` keeps the current state
    pub next_state: Option<DialogueState>,
    pub effects: Vec<Effect>,
    /// The stored document was modified and must be persisted
    pub changed: bool,
    /// Short toast for the callback answer
    pub notice: Option<String>,
}

impl Outcome {
    fn reply(mode: ReplyMode, text: String, buttons: ButtonRows) -> Self {
        Self {
            replies: vec![Reply {
                text,
                buttons,
                mode,
            }],
            ..Default::default()
        }
    }

    pub fn edit(text: String, buttons: ButtonRows) -> Self {
        Self::reply(ReplyMode::Edit, text, buttons)
    }

    pub fn send(text: String, buttons: ButtonRows) -> Self {
        Self::reply(ReplyMode::Send, text, buttons)
    }

    fn state(mut self, state: DialogueState) -> Self {
        self.next_state = Some(state);
        self
    }

    fn awaiting(self, input: PendingInput) -> Self {
        self.state(DialogueState::AwaitingInput(input))
    }

    fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn changed(mut self) -> Self {
        self.changed = true;
        self
    }

    fn notice(mut self, notice: String) -> Self {
        self.notice = Some(notice);
        self
    }
}

fn tr(ctx: &ChatContext, key: &str) -> String {
    t_lang(key, &ctx.lang)
}

fn tra(ctx: &ChatContext, key: &str, args: &[(&str, &str)]) -> String {
    t_args_lang(key, args, &ctx.lang)
}

fn menu_only(ctx: &ChatContext) -> ButtonRows {
    vec![main_menu_row(&ctx.lang)]
}

fn fallback(ctx: &ChatContext, mode: ReplyMode) -> Outcome {
    Outcome::reply(mode, tr(ctx, "fallback"), menu_only(ctx))
}

fn not_found(ctx: &ChatContext) -> Outcome {
    Outcome::edit(tr(ctx, "item-not-found"), menu_only(ctx))
}

fn access_denied(ctx: &ChatContext, mode: ReplyMode) -> Outcome {
    Outcome::reply(mode, tr(ctx, "access-denied"), menu_only(ctx))
}

fn format_time(ctx: &ChatContext, instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|t| format_jalali(t, ctx.tz_offset))
        .unwrap_or_else(|| "-".to_string())
}

fn percent(fraction: f64) -> String {
    format!("{:.1}", fraction * 100.0)
}

fn role_label(ctx: &ChatContext, role: AdminRole) -> String {
    tr(ctx, &format!("role-{}", role.as_str()))
}

fn on_off(ctx: &ChatContext, value: bool) -> String {
    tr(ctx, if value { "state-on" } else { "state-off" })
}

fn brand_entry(cars: &CarDatabase, index: usize) -> Option<(&String, &CarBrand)> {
    cars.brands.iter().nth(index)
}

fn find_model<'a>(cars: &'a CarDatabase, brand: &str, model: &str) -> Option<&'a CarModel> {
    cars.brands.get(brand)?.models.iter().find(|m| m.name == model)
}

/// Permission an admin callback needs; `None` for public actions
fn callback_permission(action: &CallbackAction) -> Option<Permission> {
    use CallbackAction as A;

    let permission = match action {
        A::AdminMenus
        | A::EditMenu(_)
        | A::MenuToggle(_)
        | A::MenuSetLabel(_)
        | A::MenuSetUrl(_) => Permission::MenuEditing,
        A::ChannelSettings | A::ChannelToggle | A::ChannelSetUrl => Permission::Channel,
        A::AiSettings | A::AiCycleSource | A::AiToggleKillSwitch | A::AiTogglePriority => {
            Permission::AiSettings
        }
        A::AiUpdate | A::AiUpdateStart => Permission::AiUpdate,
        A::UpdateSpreadsheet | A::Upload(_) => Permission::Spreadsheet,
        A::AddCar => Permission::AddCar,
        A::SetSupport | A::SupportInbox => Permission::SupportConfig,
        A::ManageAdmins | A::AddAdmin | A::AdminRole(_) | A::AdminRemove(_) => {
            Permission::ManageAdmins
        }
        A::SponsorMenu | A::SponsorSet | A::SponsorClear => Permission::Sponsor,
        A::BackupMenu | A::BackupNow | A::BackupSet(_) | A::BackupRestore => Permission::Backup,
        A::BroadcastMenu | A::BroadcastAll | A::BroadcastActive | A::BroadcastScheduled => {
            Permission::Broadcast
        }
        _ => return None,
    };
    Some(permission)
}

/// Permission needed to complete a pending admin input
fn pending_permission(input: &PendingInput) -> Permission {
    match input {
        PendingInput::ChannelUrl => Permission::Channel,
        PendingInput::MenuLabel { .. } | PendingInput::MenuUrl { .. } => Permission::MenuEditing,
        PendingInput::SupportContact => Permission::SupportConfig,
        PendingInput::AdminId { .. } => Permission::ManageAdmins,
        PendingInput::SponsorName | PendingInput::SponsorUrl { .. } => Permission::Sponsor,
        PendingInput::BroadcastTime | PendingInput::BroadcastContent { .. } => {
            Permission::Broadcast
        }
        PendingInput::AddBrand
        | PendingInput::AddModel { .. }
        | PendingInput::AddVariant { .. }
        | PendingInput::AddMarketPrice { .. }
        | PendingInput::AddFactoryPrice { .. } => Permission::AddCar,
        PendingInput::Spreadsheet { .. } => Permission::Spreadsheet,
        PendingInput::RestoreBackup => Permission::Backup,
    }
}

fn allowed(ctx: &ChatContext, store: &BotData, permission: Permission) -> bool {
    store
        .role_of(ctx.user_id, ctx.owner_id)
        .is_some_and(|role| role.allows(permission))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Handle a slash command. Commands always leave any pending flow.
pub fn handle_command(ctx: &ChatContext, command: &Command, store: &mut BotData) -> Outcome {
    debug!(user_id = ctx.user_id, command = ?command, "Handling command");
    match command {
        Command::Start => main_menu(ctx, store, ReplyMode::Send),
        Command::Help => {
            Outcome::send(tr(ctx, "help-text"), menu_only(ctx)).state(DialogueState::Idle)
        }
        Command::Id => Outcome::send(
            tra(ctx, "your-id", &[("id", &ctx.user_id.to_string())]),
            Vec::new(),
        ),
        Command::Price => price_list(ctx, store).state(DialogueState::Idle),
        Command::Admin => match store.role_of(ctx.user_id, ctx.owner_id) {
            Some(role) => admin_home(ctx, role, ReplyMode::Send),
            None => access_denied(ctx, ReplyMode::Send).state(DialogueState::Idle),
        },
    }
}

fn main_menu(ctx: &ChatContext, store: &BotData, mode: ReplyMode) -> Outcome {
    let options = MainMenuOptions {
        menu: &store.menu,
        support: &store.support,
        sponsor: store.sponsor.as_ref(),
        role: store.role_of(ctx.user_id, ctx.owner_id),
        show_ai_update: ctx.ai_configured,
    };
    Outcome::reply(
        mode,
        tr(ctx, "main-menu-title"),
        ui_builder::main_menu(&options, &ctx.lang),
    )
    .state(DialogueState::Idle)
}

fn source_label(ctx: &ChatContext, source: PriceSource) -> String {
    let key = match source {
        PriceSource::Ai => "source-ai",
        PriceSource::Spreadsheet => "source-spreadsheet",
        PriceSource::None => "source-none",
    };
    tr(ctx, key)
}

fn price_list(ctx: &ChatContext, store: &BotData) -> Outcome {
    let catalog = store.prices.active(store.settings.priority);
    if catalog.cars.is_empty() {
        return Outcome::send(tr(ctx, "no-prices"), menu_only(ctx));
    }

    let header = tra(
        ctx,
        "price-list-header",
        &[
            ("source", &source_label(ctx, catalog.source)),
            ("updated", &format_time(ctx, catalog.updated_at)),
        ],
    );
    let mut replies = vec![Reply {
        text: header,
        buttons: Vec::new(),
        mode: ReplyMode::Send,
    }];
    replies.extend(
        render_price_list(catalog.cars, MAX_MESSAGE_CHARS)
            .into_iter()
            .map(|text| Reply {
                text,
                buttons: Vec::new(),
                mode: ReplyMode::Send,
            }),
    );
    if let Some(last) = replies.last_mut() {
        last.buttons = menu_only(ctx);
    }

    Outcome {
        replies,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Handle an inline button press
pub fn handle_callback(
    ctx: &ChatContext,
    state: &DialogueState,
    data: &str,
    store: &mut BotData,
) -> Outcome {
    let Some(action) = CallbackAction::parse(data) else {
        debug!(user_id = ctx.user_id, data = %data, "Unknown callback identifier");
        return fallback(ctx, ReplyMode::Edit);
    };

    if let Some(permission) = callback_permission(&action) {
        if !allowed(ctx, store, permission) {
            warn!(user_id = ctx.user_id, action = ?action, "Admin action denied");
            return access_denied(ctx, ReplyMode::Edit);
        }
    }

    use CallbackAction as A;
    match action {
        A::MainMenu => main_menu(ctx, store, ReplyMode::Edit),
        A::Prices => car_brands(ctx, store, DialogueState::BrowsingBrands, "choose-brand"),
        A::Estimate => car_brands(ctx, store, DialogueState::EstimateBrand, "estimate-choose-brand"),
        A::Brand(b) => car_models(ctx, state, store, b),
        A::Model(b, m) => car_model_selected(ctx, state, store, b, m),
        A::Variant(b, m, v) => variant_detail(ctx, store, b, m, v, CallbackAction::Brand(b)),
        A::Year(year) => estimate_year(ctx, state, year),
        A::Paint(index) => estimate_result(ctx, state, store, index),
        A::MobileList => mobile_brands(ctx, store),
        A::MobileBrand(b) => mobile_models(ctx, store, b),
        A::MobileModel(b, m) => mobile_detail(ctx, store, b, m, CallbackAction::MobileBrand(b)),
        A::Search => Outcome::edit(tr(ctx, "search-prompt"), menu_only(ctx))
            .state(DialogueState::Searching),
        A::SearchHitCar(b, m, v) => variant_detail(ctx, store, b, m, v, CallbackAction::Search),
        A::SearchHitMobile(b, m) => mobile_detail(ctx, store, b, m, CallbackAction::Search),
        A::Support => support(ctx, store),
        A::AdminHome => match store.role_of(ctx.user_id, ctx.owner_id) {
            Some(role) => admin_home(ctx, role, ReplyMode::Edit),
            None => access_denied(ctx, ReplyMode::Edit),
        },
        A::AdminMenus => Outcome::edit(
            tr(ctx, "menu-editor-title"),
            ui_builder::menu_editor_keyboard(&store.menu, &ctx.lang),
        ),
        A::EditMenu(key) => menu_entry(ctx, store, &key),
        A::MenuToggle(key) => match store.menu.toggle(&key) {
            Some(active) => {
                info!(user_id = ctx.user_id, key = %key, active, "Menu entry toggled");
                menu_entry(ctx, store, &key)
                    .changed()
                    .notice(on_off(ctx, active))
            }
            None => not_found(ctx),
        },
        A::MenuSetLabel(key) => match store.menu.get(&key) {
            Some(entry) => Outcome::edit(
                tra(ctx, "menu-label-prompt", &[("label", &entry.label)]),
                back_rows(CallbackAction::EditMenu(key.clone()), &ctx.lang),
            )
            .awaiting(PendingInput::MenuLabel { key }),
            None => not_found(ctx),
        },
        A::MenuSetUrl(key) => match store.menu.get(&key) {
            Some(entry) if entry.has_url() => Outcome::edit(
                tra(
                    ctx,
                    "menu-url-prompt",
                    &[("url", entry.url.as_deref().unwrap_or("-"))],
                ),
                back_rows(CallbackAction::EditMenu(key.clone()), &ctx.lang),
            )
            .awaiting(PendingInput::MenuUrl { key }),
            _ => not_found(ctx),
        },
        A::ChannelSettings => channel_settings(ctx, store),
        A::ChannelToggle => match store.menu.toggle(menu::CHANNEL) {
            Some(active) => channel_settings(ctx, store)
                .changed()
                .notice(on_off(ctx, active)),
            None => not_found(ctx),
        },
        A::ChannelSetUrl => Outcome::edit(
            tr(ctx, "channel-url-prompt"),
            back_rows(CallbackAction::ChannelSettings, &ctx.lang),
        )
        .awaiting(PendingInput::ChannelUrl),
        A::AiSettings => ai_settings(ctx, store),
        A::AiCycleSource => {
            store.settings.ai_source = store.settings.ai_source.next();
            info!(user_id = ctx.user_id, source = %store.settings.ai_source, "AI source changed");
            ai_settings(ctx, store).changed()
        }
        A::AiToggleKillSwitch => {
            store.settings.ai_kill_switch = !store.settings.ai_kill_switch;
            let active = store.settings.ai_kill_switch;
            info!(user_id = ctx.user_id, kill_switch = active, "AI kill switch toggled");
            ai_settings(ctx, store)
                .changed()
                .notice(on_off(ctx, active))
                .effect(Effect::RestartPriceJob)
        }
        A::AiTogglePriority => {
            store.settings.priority = store.settings.priority.toggled();
            ai_settings(ctx, store)
                .changed()
                .effect(Effect::RestartPriceJob)
        }
        A::AiUpdate => ai_update_confirm(ctx, store),
        A::AiUpdateStart => {
            if store.settings.ai_kill_switch {
                return Outcome::edit(tr(ctx, "ai-kill-switch-on"), menu_only(ctx));
            }
            Outcome::edit(tr(ctx, "ai-update-started"), menu_only(ctx))
                .effect(Effect::RefreshAiPrices)
                .state(DialogueState::Idle)
        }
        A::UpdateSpreadsheet => Outcome::edit(
            tr(ctx, "spreadsheet-choose-niche"),
            vec![
                vec![
                    InlineButton::callback(
                        tr(ctx, "niche-cars"),
                        CallbackAction::Upload(Niche::Cars).data(),
                    ),
                    InlineButton::callback(
                        tr(ctx, "niche-mobile"),
                        CallbackAction::Upload(Niche::Mobile).data(),
                    ),
                ],
                vec![InlineButton::callback(
                    tr(ctx, "btn-back"),
                    CallbackAction::AdminHome.data(),
                )],
            ],
        ),
        A::Upload(niche) => Outcome::edit(
            tra(ctx, "spreadsheet-send-file", &[("niche", &tr(ctx, &format!("niche-{}", niche.as_str())))]),
            back_rows(CallbackAction::AdminHome, &ctx.lang),
        )
        .awaiting(PendingInput::Spreadsheet { niche }),
        A::AddCar => Outcome::edit(
            tr(ctx, "add-car-brand"),
            back_rows(CallbackAction::AdminHome, &ctx.lang),
        )
        .awaiting(PendingInput::AddBrand),
        A::SetSupport => {
            let mode_key = match store.support.mode {
                SupportMode::Text => "support-mode-text",
                SupportMode::Link => "support-mode-link",
            };
            Outcome::edit(
                tra(
                    ctx,
                    "support-config-prompt",
                    &[("mode", &tr(ctx, mode_key)), ("value", &store.support.value)],
                ),
                back_rows(CallbackAction::AdminHome, &ctx.lang),
            )
            .awaiting(PendingInput::SupportContact)
        }
        A::SupportInbox => support_inbox(ctx, store),
        A::ManageAdmins => admin_list(ctx, store),
        A::AddAdmin => {
            let roles = [AdminRole::Full, AdminRole::Editor, AdminRole::Support]
                .into_iter()
                .map(|role| {
                    InlineButton::callback(
                        role_label(ctx, role),
                        CallbackAction::AdminRole(role).data(),
                    )
                })
                .collect();
            let mut rows = ui_builder::grid(roles, 3);
            rows.extend(back_rows(CallbackAction::ManageAdmins, &ctx.lang));
            Outcome::edit(tr(ctx, "admin-choose-role"), rows)
        }
        A::AdminRole(role) => Outcome::edit(
            tra(ctx, "admin-id-prompt", &[("role", &role_label(ctx, role))]),
            back_rows(CallbackAction::ManageAdmins, &ctx.lang),
        )
        .awaiting(PendingInput::AdminId { role }),
        A::AdminRemove(id) => {
            if store.admins.remove(&id).is_some() {
                info!(user_id = ctx.user_id, removed = id, "Admin removed");
                admin_list(ctx, store)
                    .changed()
                    .notice(tra(ctx, "admin-removed", &[("id", &id.to_string())]))
            } else {
                admin_list(ctx, store)
            }
        }
        A::SponsorMenu => sponsor_menu(ctx, store),
        A::SponsorSet => Outcome::edit(
            tr(ctx, "sponsor-name-prompt"),
            back_rows(CallbackAction::SponsorMenu, &ctx.lang),
        )
        .awaiting(PendingInput::SponsorName),
        A::SponsorClear => {
            let had_sponsor = store.sponsor.take().is_some();
            let outcome = sponsor_menu(ctx, store).notice(tr(ctx, "sponsor-cleared"));
            if had_sponsor {
                outcome.changed()
            } else {
                outcome
            }
        }
        A::BackupMenu => backup_menu(ctx, store),
        A::BackupNow => Outcome::edit(tr(ctx, "backup-sending"), menu_only(ctx))
            .effect(Effect::SendBackup),
        A::BackupSet(hours) => {
            store.backup_interval = hours;
            info!(user_id = ctx.user_id, hours, "Backup interval changed");
            backup_menu(ctx, store)
                .changed()
                .effect(Effect::RestartBackupJob)
        }
        A::BackupRestore => Outcome::edit(
            tr(ctx, "restore-prompt"),
            back_rows(CallbackAction::BackupMenu, &ctx.lang),
        )
        .awaiting(PendingInput::RestoreBackup),
        A::BroadcastMenu => {
            let buttons = vec![
                InlineButton::callback(tr(ctx, "broadcast-all"), CallbackAction::BroadcastAll.data()),
                InlineButton::callback(
                    tr(ctx, "broadcast-active"),
                    CallbackAction::BroadcastActive.data(),
                ),
                InlineButton::callback(
                    tr(ctx, "broadcast-schedule"),
                    CallbackAction::BroadcastScheduled.data(),
                ),
            ];
            let mut rows = ui_builder::grid(buttons, 1);
            rows.extend(back_rows(CallbackAction::AdminHome, &ctx.lang));
            Outcome::edit(
                tra(ctx, "broadcast-menu", &[("users", &store.users.len().to_string())]),
                rows,
            )
        }
        A::BroadcastAll => broadcast_content_prompt(ctx, store, Audience::All),
        A::BroadcastActive => broadcast_content_prompt(ctx, store, Audience::Active),
        A::BroadcastScheduled => Outcome::edit(
            tr(ctx, "broadcast-time-prompt"),
            back_rows(CallbackAction::BroadcastMenu, &ctx.lang),
        )
        .awaiting(PendingInput::BroadcastTime),
    }
}

fn broadcast_content_prompt(ctx: &ChatContext, store: &BotData, audience: Audience) -> Outcome {
    let recipients = store.audience_ids(audience, ctx.now).len();
    Outcome::edit(
        tra(ctx, "broadcast-content-prompt", &[("count", &recipients.to_string())]),
        back_rows(CallbackAction::BroadcastMenu, &ctx.lang),
    )
    .awaiting(PendingInput::BroadcastContent {
        audience,
        due_at: None,
    })
}

fn car_brands(ctx: &ChatContext, store: &BotData, next: DialogueState, title: &str) -> Outcome {
    let catalog = store.prices.active(store.settings.priority);
    if catalog.cars.is_empty() {
        return Outcome::edit(tr(ctx, "no-prices"), menu_only(ctx)).state(DialogueState::Idle);
    }
    Outcome::edit(
        tr(ctx, title),
        ui_builder::car_brands_keyboard(catalog.cars, &ctx.lang),
    )
    .state(next)
}

fn car_models(ctx: &ChatContext, state: &DialogueState, store: &BotData, b: usize) -> Outcome {
    let cars = store.prices.active(store.settings.priority).cars;
    let Some((key, brand)) = brand_entry(cars, b) else {
        return not_found(ctx);
    };

    let estimating = matches!(state, DialogueState::EstimateBrand);
    let (back, next, title) = if estimating {
        (
            CallbackAction::Estimate,
            DialogueState::EstimateModel { brand: key.clone() },
            "estimate-choose-model",
        )
    } else {
        (
            CallbackAction::Prices,
            DialogueState::BrowsingModels { brand: key.clone() },
            "choose-model",
        )
    };

    Outcome::edit(
        tra(ctx, title, &[("brand", &brand.name)]),
        ui_builder::car_models_keyboard(b, brand, back, &ctx.lang),
    )
    .state(next)
}

fn car_model_selected(
    ctx: &ChatContext,
    state: &DialogueState,
    store: &BotData,
    b: usize,
    m: usize,
) -> Outcome {
    let cars = store.prices.active(store.settings.priority).cars;
    let Some((key, brand)) = brand_entry(cars, b) else {
        return not_found(ctx);
    };
    let Some(model) = brand.models.get(m) else {
        return not_found(ctx);
    };

    if matches!(state, DialogueState::EstimateModel { .. }) {
        let years = recent_years(ctx.current_year);
        return Outcome::edit(
            tra(ctx, "estimate-choose-year", &[("model", &model.name)]),
            ui_builder::year_keyboard(&years, &ctx.lang),
        )
        .state(DialogueState::EstimateYear {
            brand: key.clone(),
            model: model.name.clone(),
        });
    }

    Outcome::edit(
        tra(ctx, "choose-variant", &[("brand", &brand.name), ("model", &model.name)]),
        ui_builder::car_variants_keyboard(b, m, model, &ctx.lang),
    )
    .state(DialogueState::BrowsingVariants {
        brand: key.clone(),
        model: model.name.clone(),
    })
}

fn variant_text(
    ctx: &ChatContext,
    brand: &CarBrand,
    model: &CarModel,
    variant: &CarVariant,
    updated: Option<DateTime<Utc>>,
) -> String {
    tra(
        ctx,
        "variant-detail",
        &[
            ("brand", &brand.name),
            ("model", &model.name),
            ("variant", &variant.name),
            ("market", &format_price(market_floor(variant.market_price))),
            ("factory", &format_price(variant.factory_price)),
            ("updated", &format_time(ctx, updated)),
        ],
    )
}

fn variant_detail(
    ctx: &ChatContext,
    store: &BotData,
    b: usize,
    m: usize,
    v: usize,
    back: CallbackAction,
) -> Outcome {
    let catalog = store.prices.active(store.settings.priority);
    let Some((_, brand)) = brand_entry(catalog.cars, b) else {
        return not_found(ctx);
    };
    let Some(model) = brand.models.get(m) else {
        return not_found(ctx);
    };
    let Some(variant) = model.variants.get(v) else {
        return not_found(ctx);
    };

    Outcome::edit(
        variant_text(ctx, brand, model, variant, catalog.updated_at),
        back_rows(back, &ctx.lang),
    )
}

fn estimate_year(ctx: &ChatContext, state: &DialogueState, year: i32) -> Outcome {
    let DialogueState::EstimateYear { brand, model } = state else {
        return fallback(ctx, ReplyMode::Edit);
    };
    if !recent_years(ctx.current_year).contains(&year) {
        return fallback(ctx, ReplyMode::Edit);
    }

    Outcome::edit(
        tra(ctx, "estimate-mileage-prompt", &[("year", &year.to_string())]),
        menu_only(ctx),
    )
    .state(DialogueState::EstimateMileage {
        brand: brand.clone(),
        model: model.clone(),
        year,
    })
}

fn estimate_result(
    ctx: &ChatContext,
    state: &DialogueState,
    store: &BotData,
    index: usize,
) -> Outcome {
    let DialogueState::EstimatePaint {
        brand,
        model,
        year,
        mileage,
    } = state
    else {
        return fallback(ctx, ReplyMode::Edit);
    };
    let Some(condition) = PAINT_CONDITIONS.get(index) else {
        return fallback(ctx, ReplyMode::Edit);
    };

    let cars = store.prices.active(store.settings.priority).cars;
    let zero_price = find_model(cars, brand, model)
        .and_then(|m| m.variants.first())
        .map(|v| v.market_price)
        .filter(|price| *price > 0.0);
    let Some(zero_price) = zero_price else {
        return Outcome::edit(tr(ctx, "estimate-unavailable"), menu_only(ctx))
            .state(DialogueState::Idle);
    };

    let estimate = estimate_price(zero_price, *year, ctx.current_year, *mileage, condition.drop);
    debug!(user_id = ctx.user_id, brand = %brand, model = %model, year, price = estimate.price, "Estimate computed");

    let text = tra(
        ctx,
        "estimate-result",
        &[
            ("model", model),
            ("year", &year.to_string()),
            ("mileage", &format_price(*mileage as f64)),
            ("condition", &tr(ctx, condition.key)),
            ("zero", &format_price(estimate.zero_price)),
            ("age", &percent(estimate.age_drop)),
            ("usage", &percent(estimate.mileage_drop)),
            ("paint", &percent(estimate.paint_drop)),
            ("price", &format_price(estimate.price)),
        ],
    );
    let buttons = vec![
        vec![InlineButton::callback(
            tr(ctx, "btn-new-estimate"),
            CallbackAction::Estimate.data(),
        )],
        main_menu_row(&ctx.lang),
    ];
    Outcome::edit(text, buttons).state(DialogueState::Idle)
}

fn mobile_brands(ctx: &ChatContext, store: &BotData) -> Outcome {
    if store.prices.mobiles.is_empty() {
        return Outcome::edit(tr(ctx, "no-mobiles"), menu_only(ctx));
    }
    Outcome::edit(
        tr(ctx, "mobile-choose-brand"),
        ui_builder::mobile_brands_keyboard(&store.prices.mobiles, &ctx.lang),
    )
    .state(DialogueState::MobileBrowsing)
}

fn mobile_models(ctx: &ChatContext, store: &BotData, b: usize) -> Outcome {
    match store.prices.mobiles.brand_at(b) {
        Some(brand) => Outcome::edit(
            tra(ctx, "mobile-choose-model", &[("brand", &brand.name)]),
            ui_builder::mobile_models_keyboard(b, brand, &ctx.lang),
        )
        .state(DialogueState::MobileBrowsing),
        None => not_found(ctx),
    }
}

fn mobile_text(ctx: &ChatContext, brand: &str, model: &MobileModel) -> String {
    let storage = if model.storage.is_empty() {
        "-".to_string()
    } else {
        model.storage.clone()
    };
    tra(
        ctx,
        "mobile-detail",
        &[
            ("brand", brand),
            ("model", &model.name),
            ("storage", &storage),
            ("price", &format_price(model.price)),
        ],
    )
}

fn mobile_detail(
    ctx: &ChatContext,
    store: &BotData,
    b: usize,
    m: usize,
    back: CallbackAction,
) -> Outcome {
    let Some(brand) = store.prices.mobiles.brand_at(b) else {
        return not_found(ctx);
    };
    match brand.models.get(m) {
        Some(model) => Outcome::edit(mobile_text(ctx, &brand.name, model), back_rows(back, &ctx.lang)),
        None => not_found(ctx),
    }
}

fn support(ctx: &ChatContext, store: &BotData) -> Outcome {
    match store.support.mode {
        SupportMode::Link => Outcome::edit(
            tr(ctx, "support-link"),
            vec![
                vec![InlineButton::url(tr(ctx, "btn-contact-support"), &store.support.value)],
                main_menu_row(&ctx.lang),
            ],
        ),
        SupportMode::Text => Outcome::edit(store.support.value.clone(), menu_only(ctx))
            .state(DialogueState::SupportMessage),
    }
}

fn admin_home(ctx: &ChatContext, role: AdminRole, mode: ReplyMode) -> Outcome {
    Outcome::reply(
        mode,
        tra(ctx, "admin-panel-title", &[("role", &role_label(ctx, role))]),
        ui_builder::admin_panel_keyboard(role, &ctx.lang),
    )
    .state(DialogueState::Idle)
}

fn menu_entry_text(ctx: &ChatContext, entry: &MenuEntry) -> String {
    tra(
        ctx,
        "menu-entry-detail",
        &[
            ("label", &entry.label),
            ("status", &on_off(ctx, entry.active)),
            ("url", entry.url.as_deref().unwrap_or("-")),
        ],
    )
}

fn menu_entry(ctx: &ChatContext, store: &BotData, key: &str) -> Outcome {
    match store.menu.get(key) {
        Some(entry) => Outcome::edit(
            menu_entry_text(ctx, entry),
            ui_builder::menu_entry_keyboard(key, entry, &ctx.lang),
        ),
        None => not_found(ctx),
    }
}

fn channel_settings(ctx: &ChatContext, store: &BotData) -> Outcome {
    let Some(entry) = store.menu.get(menu::CHANNEL) else {
        return not_found(ctx);
    };
    let toggle_key = if entry.active { "btn-disable" } else { "btn-enable" };
    let mut rows = vec![vec![
        InlineButton::callback(tr(ctx, toggle_key), CallbackAction::ChannelToggle.data()),
        InlineButton::callback(tr(ctx, "btn-set-url"), CallbackAction::ChannelSetUrl.data()),
    ]];
    rows.extend(back_rows(CallbackAction::AdminHome, &ctx.lang));
    Outcome::edit(menu_entry_text(ctx, entry), rows)
}

fn ai_settings(ctx: &ChatContext, store: &BotData) -> Outcome {
    let settings = &store.settings;
    let priority_key = match settings.priority {
        Priority::Ai => "priority-ai",
        Priority::Spreadsheet => "priority-spreadsheet",
    };
    let text = tra(
        ctx,
        "ai-settings-title",
        &[
            ("source", &settings.ai_source.to_string()),
            ("key", &on_off(ctx, ctx.ai_configured)),
            ("kill", &on_off(ctx, settings.ai_kill_switch)),
            ("priority", &tr(ctx, priority_key)),
            ("updated", &format_time(ctx, settings.last_updated)),
        ],
    );
    let mut rows = vec![
        vec![InlineButton::callback(
            tr(ctx, "btn-cycle-source"),
            CallbackAction::AiCycleSource.data(),
        )],
        vec![InlineButton::callback(
            tr(ctx, "btn-toggle-kill"),
            CallbackAction::AiToggleKillSwitch.data(),
        )],
        vec![InlineButton::callback(
            tr(ctx, "btn-toggle-priority"),
            CallbackAction::AiTogglePriority.data(),
        )],
    ];
    rows.extend(back_rows(CallbackAction::AdminHome, &ctx.lang));
    Outcome::edit(text, rows)
}

fn ai_update_confirm(ctx: &ChatContext, store: &BotData) -> Outcome {
    if store.settings.ai_kill_switch {
        return Outcome::edit(tr(ctx, "ai-kill-switch-on"), menu_only(ctx));
    }
    if !ctx.ai_configured {
        return Outcome::edit(
            tra(ctx, "ai-no-key", &[("source", &store.settings.ai_source.to_string())]),
            menu_only(ctx),
        );
    }
    Outcome::edit(
        tra(ctx, "ai-update-confirm", &[("source", &store.settings.ai_source.to_string())]),
        vec![vec![
            InlineButton::callback(tr(ctx, "btn-confirm"), CallbackAction::AiUpdateStart.data()),
            InlineButton::callback(tr(ctx, "btn-cancel"), CallbackAction::AdminHome.data()),
        ]],
    )
}

fn support_inbox(ctx: &ChatContext, store: &BotData) -> Outcome {
    let back = back_rows(CallbackAction::AdminHome, &ctx.lang);
    if store.support_inbox.is_empty() {
        return Outcome::edit(tr(ctx, "inbox-empty"), back);
    }
    let lines: Vec<String> = store
        .support_inbox
        .iter()
        .rev()
        .take(INBOX_PREVIEW)
        .map(|message| {
            let sender = match message.sender {
                crate::models::Sender::User { id } => id.to_string(),
                crate::models::Sender::Bot => "bot".to_string(),
            };
            format!(
                "• {} ({}): {}",
                sender,
                format_jalali(message.timestamp, ctx.tz_offset),
                message.text
            )
        })
        .collect();
    Outcome::edit(
        format!("{}\n\n{}", tr(ctx, "inbox-title"), lines.join("\n")),
        back,
    )
}

fn admin_list(ctx: &ChatContext, store: &BotData) -> Outcome {
    let mut lines = Vec::new();
    if ctx.owner_id != 0 {
        lines.push(tra(ctx, "admin-owner-line", &[("id", &ctx.owner_id.to_string())]));
    }
    let mut rows: ButtonRows = Vec::new();
    for (id, role) in &store.admins {
        lines.push(format!("• {} ({})", id, role_label(ctx, *role)));
        rows.push(vec![InlineButton::callback(
            tra(ctx, "btn-remove-admin", &[("id", &id.to_string())]),
            CallbackAction::AdminRemove(*id).data(),
        )]);
    }
    rows.push(vec![InlineButton::callback(
        tr(ctx, "btn-add-admin"),
        CallbackAction::AddAdmin.data(),
    )]);
    rows.extend(back_rows(CallbackAction::AdminHome, &ctx.lang));

    let body = if lines.is_empty() {
        tr(ctx, "admin-list-empty")
    } else {
        lines.join("\n")
    };
    Outcome::edit(format!("{}\n\n{}", tr(ctx, "admin-list-title"), body), rows)
}

fn sponsor_menu(ctx: &ChatContext, store: &BotData) -> Outcome {
    let text = match &store.sponsor {
        Some(sponsor) => tra(
            ctx,
            "sponsor-current",
            &[("name", &sponsor.name), ("url", &sponsor.url)],
        ),
        None => tr(ctx, "sponsor-none"),
    };
    let mut rows = vec![vec![
        InlineButton::callback(tr(ctx, "btn-set-sponsor"), CallbackAction::SponsorSet.data()),
        InlineButton::callback(tr(ctx, "btn-clear-sponsor"), CallbackAction::SponsorClear.data()),
    ]];
    rows.extend(back_rows(CallbackAction::AdminHome, &ctx.lang));
    Outcome::edit(text, rows)
}

fn backup_menu(ctx: &ChatContext, store: &BotData) -> Outcome {
    let interval = match store.backup_interval {
        0 => tr(ctx, "backup-disabled"),
        hours => tra(ctx, "backup-every", &[("hours", &hours.to_string())]),
    };
    let mut rows = vec![
        vec![InlineButton::callback(
            tr(ctx, "btn-backup-now"),
            CallbackAction::BackupNow.data(),
        )],
        vec![
            InlineButton::callback(tr(ctx, "btn-backup-hourly"), CallbackAction::BackupSet(1).data()),
            InlineButton::callback(tr(ctx, "btn-backup-daily"), CallbackAction::BackupSet(24).data()),
            InlineButton::callback(tr(ctx, "btn-backup-off"), CallbackAction::BackupSet(0).data()),
        ],
        vec![InlineButton::callback(
            tr(ctx, "btn-restore"),
            CallbackAction::BackupRestore.data(),
        )],
    ];
    rows.extend(back_rows(CallbackAction::AdminHome, &ctx.lang));
    Outcome::edit(tra(ctx, "backup-menu", &[("interval", &interval)]), rows)
}

// ---------------------------------------------------------------------------
// Free text
// ---------------------------------------------------------------------------

/// Handle a plain text message
pub fn handle_text(
    ctx: &ChatContext,
    state: &DialogueState,
    text: &str,
    store: &mut BotData,
) -> Outcome {
    match state {
        DialogueState::EstimateMileage { brand, model, year } => match parse_mileage(text) {
            Some(mileage) => Outcome::send(
                tra(ctx, "estimate-paint-prompt", &[("mileage", &format_price(mileage as f64))]),
                ui_builder::paint_keyboard(&ctx.lang),
            )
            .state(DialogueState::EstimatePaint {
                brand: brand.clone(),
                model: model.clone(),
                year: *year,
                mileage,
            }),
            None => Outcome::send(tr(ctx, "estimate-invalid-mileage"), menu_only(ctx)),
        },
        DialogueState::Searching => {
            let catalog = store.prices.active(store.settings.priority);
            let hits = search(catalog.cars, &store.prices.mobiles, text, MAX_SEARCH_HITS);
            if hits.is_empty() {
                Outcome::send(tra(ctx, "search-not-found", &[("query", text.trim())]), menu_only(ctx))
            } else {
                Outcome::send(
                    tra(ctx, "search-results", &[("count", &hits.len().to_string())]),
                    ui_builder::search_results_keyboard(&hits, &ctx.lang),
                )
            }
        }
        DialogueState::SupportMessage => {
            let text = text.trim();
            if text.is_empty() {
                return Outcome::send(store.support.value.clone(), menu_only(ctx));
            }
            store.record_support_message(ChatMessage::from_user(ctx.user_id, text, ctx.now));
            info!(user_id = ctx.user_id, "Support message recorded");
            Outcome::send(tr(ctx, "support-received"), menu_only(ctx))
                .changed()
                .effect(Effect::ForwardToSupport {
                    text: text.to_string(),
                })
                .state(DialogueState::Idle)
        }
        DialogueState::AwaitingInput(input) => {
            if !allowed(ctx, store, pending_permission(input)) {
                return access_denied(ctx, ReplyMode::Send).state(DialogueState::Idle);
            }
            if input.expects_document() {
                return Outcome::send(tr(ctx, "expecting-document"), menu_only(ctx));
            }
            handle_pending_text(ctx, input, text, store)
        }
        _ => fallback(ctx, ReplyMode::Send),
    }
}

fn name_error(ctx: &ChatContext, error: &str) -> Outcome {
    let key = match error {
        "too_long" => "error-name-too-long",
        _ => "error-empty-name",
    };
    Outcome::send(tr(ctx, key), menu_only(ctx))
}

fn url_error(ctx: &ChatContext) -> Outcome {
    Outcome::send(tr(ctx, "error-invalid-url"), menu_only(ctx))
}

fn saved(ctx: &ChatContext, back: CallbackAction) -> Outcome {
    Outcome::send(tr(ctx, "saved"), back_rows(back, &ctx.lang))
        .changed()
        .state(DialogueState::Idle)
}

fn handle_pending_text(
    ctx: &ChatContext,
    input: &PendingInput,
    text: &str,
    store: &mut BotData,
) -> Outcome {
    match input {
        PendingInput::ChannelUrl => match validate_url(text) {
            Ok(url) => {
                store.menu.set_url(menu::CHANNEL, &url);
                saved(ctx, CallbackAction::ChannelSettings)
            }
            Err(_) => url_error(ctx),
        },
        PendingInput::MenuLabel { key } => match validate_name(text) {
            Ok(label) => {
                if store.menu.set_label(key, &label) {
                    saved(ctx, CallbackAction::EditMenu(key.clone()))
                } else {
                    fallback(ctx, ReplyMode::Send).state(DialogueState::Idle)
                }
            }
            Err(e) => name_error(ctx, e),
        },
        PendingInput::MenuUrl { key } => match validate_url(text) {
            Ok(url) => {
                if store.menu.set_url(key, &url) {
                    saved(ctx, CallbackAction::EditMenu(key.clone()))
                } else {
                    fallback(ctx, ReplyMode::Send).state(DialogueState::Idle)
                }
            }
            Err(_) => url_error(ctx),
        },
        PendingInput::SupportContact => {
            if text.trim().is_empty() {
                return name_error(ctx, "empty");
            }
            store.support = SupportConfig::from_input(text);
            info!(user_id = ctx.user_id, mode = ?store.support.mode, "Support configuration changed");
            saved(ctx, CallbackAction::AdminHome)
        }
        PendingInput::AdminId { role } => match parse_user_id(text) {
            Some(id) => {
                store.admins.insert(id, *role);
                info!(user_id = ctx.user_id, admin = id, role = role.as_str(), "Admin added");
                Outcome::send(
                    tra(
                        ctx,
                        "admin-added",
                        &[("id", &id.to_string()), ("role", &role_label(ctx, *role))],
                    ),
                    back_rows(CallbackAction::ManageAdmins, &ctx.lang),
                )
                .changed()
                .state(DialogueState::Idle)
            }
            None => Outcome::send(tr(ctx, "error-invalid-id"), menu_only(ctx)),
        },
        PendingInput::SponsorName => match validate_name(text) {
            Ok(name) => Outcome::send(tr(ctx, "sponsor-url-prompt"), menu_only(ctx))
                .awaiting(PendingInput::SponsorUrl { name }),
            Err(e) => name_error(ctx, e),
        },
        PendingInput::SponsorUrl { name } => match validate_url(text) {
            Ok(url) => {
                store.sponsor = Some(Sponsor {
                    name: name.clone(),
                    url,
                });
                saved(ctx, CallbackAction::SponsorMenu)
            }
            Err(_) => url_error(ctx),
        },
        PendingInput::BroadcastTime => match parse_schedule(text, ctx.tz_offset) {
            Some(due_at) if due_at > ctx.now => Outcome::send(
                tra(ctx, "broadcast-content-prompt", &[("count", &store.users.len().to_string())]),
                menu_only(ctx),
            )
            .awaiting(PendingInput::BroadcastContent {
                audience: Audience::All,
                due_at: Some(due_at),
            }),
            Some(_) => Outcome::send(tr(ctx, "broadcast-past-time"), menu_only(ctx)),
            None => Outcome::send(tr(ctx, "broadcast-invalid-time"), menu_only(ctx)),
        },
        PendingInput::BroadcastContent { audience, due_at } => {
            let content = text.trim();
            if content.is_empty() {
                return Outcome::send(tr(ctx, "error-empty-message"), menu_only(ctx));
            }
            match due_at {
                Some(due_at) => {
                    store.scheduled_broadcasts.push(ScheduledBroadcast {
                        id: Uuid::new_v4(),
                        audience: *audience,
                        text: content.to_string(),
                        due_at: *due_at,
                    });
                    info!(user_id = ctx.user_id, due_at = %due_at, "Broadcast scheduled");
                    Outcome::send(
                        tra(
                            ctx,
                            "broadcast-scheduled",
                            &[("time", &format_jalali(*due_at, ctx.tz_offset))],
                        ),
                        menu_only(ctx),
                    )
                    .changed()
                    .state(DialogueState::Idle)
                }
                None => Outcome::send(tr(ctx, "broadcast-started"), menu_only(ctx))
                    .effect(Effect::Broadcast {
                        audience: *audience,
                        text: content.to_string(),
                    })
                    .state(DialogueState::Idle),
            }
        }
        PendingInput::AddBrand => match validate_name(text) {
            Ok(brand) => Outcome::send(tra(ctx, "add-car-model", &[("brand", &brand)]), menu_only(ctx))
                .awaiting(PendingInput::AddModel { brand }),
            Err(e) => name_error(ctx, e),
        },
        PendingInput::AddModel { brand } => match validate_name(text) {
            Ok(model) => Outcome::send(tra(ctx, "add-car-variant", &[("model", &model)]), menu_only(ctx))
                .awaiting(PendingInput::AddVariant {
                    brand: brand.clone(),
                    model,
                }),
            Err(e) => name_error(ctx, e),
        },
        PendingInput::AddVariant { brand, model } => match validate_name(text) {
            Ok(variant) => Outcome::send(tr(ctx, "add-car-market"), menu_only(ctx)).awaiting(
                PendingInput::AddMarketPrice {
                    brand: brand.clone(),
                    model: model.clone(),
                    variant,
                },
            ),
            Err(e) => name_error(ctx, e),
        },
        PendingInput::AddMarketPrice {
            brand,
            model,
            variant,
        } => match parse_price(text) {
            Some(market) => Outcome::send(tr(ctx, "add-car-factory"), menu_only(ctx)).awaiting(
                PendingInput::AddFactoryPrice {
                    brand: brand.clone(),
                    model: model.clone(),
                    variant: variant.clone(),
                    market,
                },
            ),
            None => Outcome::send(tr(ctx, "error-invalid-price"), menu_only(ctx)),
        },
        PendingInput::AddFactoryPrice {
            brand,
            model,
            variant,
            market,
        } => match parse_price(text) {
            Some(factory) => {
                let mut record = CarVariant::new(variant.clone(), *market, factory);
                record.last_update = Some(ctx.now.to_rfc3339());
                let priority = store.settings.priority;
                store
                    .prices
                    .active_mut(priority)
                    .upsert_variant(brand, model, record);
                info!(user_id = ctx.user_id, brand = %brand, model = %model, variant = %variant, "Car added manually");
                Outcome::send(
                    tra(
                        ctx,
                        "car-added",
                        &[("brand", brand), ("model", model), ("variant", variant)],
                    ),
                    back_rows(CallbackAction::AdminHome, &ctx.lang),
                )
                .changed()
                .state(DialogueState::Idle)
            }
            None => Outcome::send(tr(ctx, "error-invalid-price"), menu_only(ctx)),
        },
        PendingInput::Spreadsheet { .. } | PendingInput::RestoreBackup => {
            Outcome::send(tr(ctx, "expecting-document"), menu_only(ctx))
        }
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Handle an uploaded document (spreadsheet import or backup restore)
pub fn handle_document(
    ctx: &ChatContext,
    state: &DialogueState,
    file_name: &str,
    bytes: &[u8],
    store: &mut BotData,
) -> Outcome {
    let DialogueState::AwaitingInput(input) = state else {
        return Outcome::send(tr(ctx, "document-unexpected"), menu_only(ctx));
    };
    if !input.expects_document() {
        return Outcome::send(tr(ctx, "document-unexpected"), menu_only(ctx));
    }
    if !allowed(ctx, store, pending_permission(input)) {
        return access_denied(ctx, ReplyMode::Send).state(DialogueState::Idle);
    }

    match input {
        PendingInput::Spreadsheet { niche } => {
            match import_workbook(bytes, *niche, &mut store.prices, ctx.now) {
                Ok(summary) => Outcome::send(
                    tra(
                        ctx,
                        "upload-success",
                        &[
                            ("rows", &summary.rows.to_string()),
                            ("brands", &summary.brands.to_string()),
                        ],
                    ),
                    back_rows(CallbackAction::AdminHome, &ctx.lang),
                )
                .changed()
                .state(DialogueState::Idle),
                Err(e) => {
                    warn!(user_id = ctx.user_id, file = %file_name, error = %e, "Spreadsheet import failed");
                    Outcome::send(
                        tra(ctx, "upload-failed", &[("error", &e.to_string())]),
                        menu_only(ctx),
                    )
                }
            }
        }
        PendingInput::RestoreBackup => match BotData::validate_backup(bytes) {
            Ok(restored) => {
                info!(user_id = ctx.user_id, file = %file_name, users = restored.users.len(), "Backup restored");
                *store = restored;
                Outcome::send(tr(ctx, "restore-success"), menu_only(ctx))
                    .changed()
                    .effect(Effect::RestartBackupJob)
                    .effect(Effect::RestartPriceJob)
                    .state(DialogueState::Idle)
            }
            Err(e) => {
                warn!(user_id = ctx.user_id, file = %file_name, error = %e, "Backup restore rejected");
                Outcome::send(
                    tra(ctx, "restore-failed", &[("error", &e.to_string())]),
                    menu_only(ctx),
                )
            }
        },
        _ => Outcome::send(tr(ctx, "document-unexpected"), menu_only(ctx)),
    }
}
