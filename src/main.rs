use actix_files::Files;
use actix_utils::future::{ready, Ready};
use actix_web::{
    dev::{self, ServiceResponse},
    error,
    http::{
        header::{ContentDisposition, ContentType, DispositionParam, DispositionType},
        StatusCode,
    },
    middleware::{Compress, ErrorHandlerResponse, ErrorHandlers, Logger},
    route,
    web::{Data, Json, Path},
    App, FromRequest, HttpRequest, HttpResponse, HttpServer, Responder, Result,
};
use actix_web_lab::respond::Html;
use chrono::{Datelike, NaiveDate};
use dotenv::dotenv;
use kalender::calendar::templating::{holiday_groups, holiday_value};
use kalender::calendar::{
    self, month_name, parse_iso_key, MiniMonth, MonthGrid, ViewMode, Week, DAY_NAMES,
};
use kalender::day_detail::DayDetailService;
use kalender::export::{self, Document};
use kalender::holidays::HolidayTable;
use kalender::sync::BatchSync;
use kalender::{AppConfig, SiteConfig, YEAR};
use minijinja_autoreload::AutoReloader;
use serde::Serialize;
use std::io;

struct MiniJinjaRenderer {
    tmpl_env: Data<AutoReloader>,
}

impl MiniJinjaRenderer {
    fn render(&self, tmpl: &str, ctx: impl Into<minijinja::value::Value>) -> Result<Html> {
        self.tmpl_env
            .acquire_env()
            .map_err(|_| error::ErrorInternalServerError("could not acquire template env"))?
            .get_template(tmpl)
            .map_err(|_| error::ErrorInternalServerError("could not find template"))?
            .render(ctx.into())
            .map(Html)
            .map_err(|err| {
                log::error!("{err}");
                error::ErrorInternalServerError("template error")
            })
    }
}

impl FromRequest for MiniJinjaRenderer {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _pl: &mut dev::Payload) -> Self::Future {
        ready(
            <Data<AutoReloader>>::extract(req)
                .into_inner()
                .map(|tmpl_env| Self { tmpl_env }),
        )
    }
}

/// A link in the view switcher.
#[derive(Serialize)]
struct ModeLink {
    label: &'static str,
    href: String,
    active: bool,
}

/// Header data shared by all calendar views.
#[derive(Serialize)]
struct PageHeader {
    label: String,
    modes: Vec<ModeLink>,
    prev: Option<String>,
    next: Option<String>,
    pdf: String,
    month: u32,
    month_name: &'static str,
    live: bool,
}

fn view_href(mode: ViewMode, date: NaiveDate) -> String {
    match mode {
        ViewMode::Year => "/".to_owned(),
        ViewMode::Month => format!("/monat/{}", date.month()),
        ViewMode::Week => format!("/woche/{}", calendar::iso_key(date)),
        ViewMode::Day => format!("/tag/{}", calendar::iso_key(date)),
    }
}

fn page_header(mode: ViewMode, date: NaiveDate, service: &DayDetailService) -> PageHeader {
    let step = |direction| {
        (mode != ViewMode::Year)
            .then(|| mode.step(date, direction))
            .flatten()
            .map(|date| view_href(mode, date))
    };

    PageHeader {
        label: mode.header_label(date),
        modes: ViewMode::ALL
            .into_iter()
            .map(|link| ModeLink {
                label: link.label(),
                href: view_href(link, date),
                active: link == mode,
            })
            .collect(),
        prev: step(-1),
        next: step(1),
        pdf: match mode {
            ViewMode::Year => "/export/jahr.pdf".to_owned(),
            _ => format!("/export/monat/{}.pdf", date.month()),
        },
        month: date.month(),
        month_name: month_name(date.month()).unwrap_or_default(),
        live: service.is_live(),
    }
}

/// The day the year view is focused on: today while in the supported year, New Year otherwise.
fn focus_date() -> NaiveDate {
    let today = calendar::today();
    if today.year() == YEAR {
        return today;
    }
    NaiveDate::from_ymd_opt(YEAR, 1, 1).unwrap_or(today)
}

/// Parses a day from the path, only accepting days of the supported year.
fn day_from_path(key: &str) -> Result<NaiveDate> {
    parse_iso_key(key)
        .ok()
        .filter(|date| date.year() == YEAR)
        .ok_or_else(|| error::ErrorNotFound("unknown day"))
}

fn month_from_path(month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(YEAR, month, 1).ok_or_else(|| error::ErrorNotFound("unknown month"))
}

fn attachment(document: Document, content_type: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(document.filename)],
        })
        .body(document.bytes)
}

#[route("/", method = "GET", method = "HEAD")]
async fn year_view(
    tmpl_env: MiniJinjaRenderer,
    site: Data<SiteConfig>,
    holidays: Data<HolidayTable>,
    service: Data<DayDetailService>,
) -> Result<impl Responder> {
    let date = focus_date();
    let months = MiniMonth::year(YEAR, calendar::today(), &holidays)
        .map_err(error::ErrorInternalServerError)?;
    let holiday_groups = holiday_groups(&holidays.by_month());
    let next_holiday = holidays.next_holiday_from(calendar::today()).map(holiday_value);

    tmpl_env.render(
        "year.html",
        minijinja::context! {
            site => &**site,
            page => page_header(ViewMode::Year, date, &service),
            year => YEAR,
            months,
            day_names => DAY_NAMES,
            holiday_groups,
            next_holiday,
        },
    )
}

#[route("/monat/{month}", method = "GET", method = "HEAD")]
async fn month_view(
    tmpl_env: MiniJinjaRenderer,
    path: Path<u32>,
    site: Data<SiteConfig>,
    holidays: Data<HolidayTable>,
    service: Data<DayDetailService>,
) -> Result<impl Responder> {
    let date = month_from_path(path.into_inner())?;
    let mut grid = MonthGrid::new(YEAR, date.month(), calendar::today(), &holidays)
        .map_err(error::ErrorInternalServerError)?;
    grid.annotate(&service.snapshot().await);

    tmpl_env.render(
        "month.html",
        minijinja::context! {
            site => &**site,
            page => page_header(ViewMode::Month, date, &service),
            grid,
            day_names => DAY_NAMES,
        },
    )
}

#[route("/woche/{date}", method = "GET", method = "HEAD")]
async fn week_view(
    tmpl_env: MiniJinjaRenderer,
    path: Path<String>,
    site: Data<SiteConfig>,
    holidays: Data<HolidayTable>,
    service: Data<DayDetailService>,
) -> Result<impl Responder> {
    let date = day_from_path(&path)?;
    let mut week = Week::containing(date, calendar::today(), &holidays);
    week.annotate(&service.snapshot().await);

    tmpl_env.render(
        "week.html",
        minijinja::context! {
            site => &**site,
            page => page_header(ViewMode::Week, date, &service),
            week,
        },
    )
}

#[route("/tag/{date}", method = "GET", method = "HEAD")]
async fn day_view(
    tmpl_env: MiniJinjaRenderer,
    path: Path<String>,
    site: Data<SiteConfig>,
    holidays: Data<HolidayTable>,
    service: Data<DayDetailService>,
) -> Result<impl Responder> {
    let date = day_from_path(&path)?;

    tmpl_env.render(
        "day.html",
        minijinja::context! {
            site => &**site,
            page => page_header(ViewMode::Day, date, &service),
            iso => calendar::iso_key(date),
            weekday => calendar::weekday_name(date),
            holiday => holidays.holiday_for(date).map(holiday_value),
            record => service.cached(date).await,
        },
    )
}

#[route("/api/tag/{date}", method = "GET")]
async fn day_details(path: Path<String>, service: Data<DayDetailService>) -> Result<impl Responder> {
    let date = day_from_path(&path)?;
    Ok(Json(service.resolve(date).await))
}

#[route("/api/einblick/{month}", method = "GET")]
async fn cultural_insight(path: Path<u32>, service: Data<DayDetailService>) -> Result<impl Responder> {
    let name = month_name(path.into_inner()).map_err(error::ErrorNotFound)?;
    let text = service.cultural_insight(name).await;
    Ok(Json(serde_json::json!({ "text": text })))
}

#[route("/api/sync", method = "POST")]
async fn start_sync(sync: Data<BatchSync>, service: Data<DayDetailService>) -> impl Responder {
    // Held by the background task until the sync ends.
    let Some(claim) = sync.claim() else {
        return Json(serde_json::json!({ "status": "already-running" }));
    };

    let pending = sync.pending(YEAR).await;
    if pending == 0 {
        return Json(serde_json::json!({ "status": "nothing-to-do" }));
    }
    if !service.is_live() {
        return Json(serde_json::json!({ "status": "unavailable" }));
    }

    let sync = sync.into_inner();
    actix_web::rt::spawn(async move {
        let outcome = sync.run(YEAR, claim).await;
        log::info!("background sync ended: {outcome:?}");
    });

    Json(serde_json::json!({ "status": "started", "total": pending }))
}

#[route("/api/sync", method = "GET")]
async fn sync_status(sync: Data<BatchSync>) -> impl Responder {
    Json(serde_json::json!({ "progress": sync.progress() }))
}

#[route("/export/jahr.pdf", method = "GET")]
async fn export_year(holidays: Data<HolidayTable>) -> Result<impl Responder> {
    let document = export::year_summary(&holidays).map_err(error::ErrorInternalServerError)?;
    Ok(attachment(document, "application/pdf"))
}

#[route("/export/monat/{month}.pdf", method = "GET")]
async fn export_month(
    path: Path<u32>,
    holidays: Data<HolidayTable>,
    service: Data<DayDetailService>,
) -> Result<impl Responder> {
    let date = month_from_path(path.into_inner())?;
    let records = service.snapshot().await;
    let document = export::month_grid(date.month(), &holidays, Some(&records))
        .map_err(error::ErrorInternalServerError)?;
    Ok(attachment(document, "application/pdf"))
}

#[route("/export/namenstage.json", method = "GET")]
async fn export_cache(service: Data<DayDetailService>) -> Result<impl Responder> {
    let json = service
        .to_json()
        .await
        .map_err(error::ErrorInternalServerError)?;
    let document = Document {
        filename: format!("namenstage_{YEAR}.json"),
        bytes: json.into_bytes(),
    };
    Ok(attachment(document, "application/json"))
}

#[route("/export/seed", method = "GET")]
async fn export_seed(service: Data<DayDetailService>) -> Result<impl Responder> {
    let snippet = service
        .seed_snippet()
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(snippet))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let to_io = |err: kalender::Error| io::Error::new(io::ErrorKind::Other, err.to_string());

    let config = AppConfig::load().map_err(to_io)?;
    let service = DayDetailService::from_config(&config).map_err(to_io)?;
    let sync = BatchSync::new(service.clone(), config.sync.batch_delay());
    let holidays = HolidayTable::austria_2026();
    let server = config.server.clone();

    if server.template_autoreload {
        log::info!("template auto-reloading is enabled");
    } else {
        log::info!(
            "template auto-reloading is disabled; run with KAL_SERVER__TEMPLATE_AUTORELOAD=true to enable"
        );
    }

    // The closure is invoked every time the environment is outdated to recreate it.
    let template_dir = server.template_dir.clone();
    let template_autoreload = server.template_autoreload;
    let tmpl_reloader = AutoReloader::new(move |notifier| {
        let mut env: minijinja::Environment<'static> = minijinja::Environment::new();

        // if watch_path is never called, no fs watcher is created
        if template_autoreload {
            notifier.watch_path(&template_dir, true);
        }

        env.set_source(minijinja::Source::from_path(&template_dir));

        Ok(env)
    });

    let tmpl_reloader = Data::new(tmpl_reloader);
    let site = Data::new(config.site.clone());
    let holidays = Data::new(holidays);
    let service = Data::new(service);
    let sync = Data::new(sync);

    log::info!("starting HTTP server at {}", server.listen_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(tmpl_reloader.clone())
            .app_data(site.clone())
            .app_data(holidays.clone())
            .app_data(service.clone())
            .app_data(sync.clone())
            .service(year_view)
            .service(month_view)
            .service(week_view)
            .service(day_view)
            .service(day_details)
            .service(cultural_insight)
            .service(start_sync)
            .service(sync_status)
            .service(export_year)
            .service(export_month)
            .service(export_cache)
            .service(export_seed)
            .service(Files::new("/static", &server.static_dir))
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .handler(StatusCode::INTERNAL_SERVER_ERROR, internal_server_error),
            )
            .wrap(Compress::default())
            // Don't log things that could identify the user, e.g. omit client IP, referrer and
            // user agent.
            .wrap(Logger::new(r#""%r" %s %b %T"#))
    })
    .workers(2)
    .bind(config.server.listen_addr)?
    .run()
    .await
}

/// Error handler for a 404 Page not found error.
fn not_found<B>(svc_res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_handler(svc_res, "not_found.html")
}

/// Error handler for a 500 Internal server error.
fn internal_server_error<B>(svc_res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_handler(svc_res, "error.html")
}

/// Generic error handler.
fn error_handler<B>(svc_res: ServiceResponse<B>, tmpl: &str) -> Result<ErrorHandlerResponse<B>> {
    let req = svc_res.request();

    let reason = svc_res
        .status()
        .canonical_reason()
        .unwrap_or("Unknown error");

    // Provide a fallback to a simple plain text response in case an error occurs during the
    // rendering of the error page.
    let fallback = |err: &str| {
        HttpResponse::build(svc_res.status())
            .content_type(ContentType::plaintext())
            .body(err.to_string())
    };

    let ctx = minijinja::context! {
        site => req.app_data::<Data<SiteConfig>>().map(|site| site.get_ref()),
        status_code => svc_res.status().as_str(),
        reason => reason,
    };

    let rendered = MiniJinjaRenderer::extract(req)
        .into_inner()
        .and_then(|tmpl_env| tmpl_env.render(tmpl, ctx));

    let res = match rendered {
        Ok(body) => body
            .customize()
            .with_status(svc_res.status())
            .respond_to(req)
            .map_into_boxed_body(),
        Err(_) => fallback(reason),
    };

    Ok(ErrorHandlerResponse::Response(ServiceResponse::new(
        svc_res.into_parts().0,
        res.map_into_right_body(),
    )))
}
