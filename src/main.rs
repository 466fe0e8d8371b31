//! sensorclip CLI
//!
//! Query tool for the sensor Data API with event clip extraction.

use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use sensorclip::{
    aggregate::{build_report, device_sensor_map, write_report_csv},
    api::{
        BlockingDataApiClient, InProgressEvents, LatestSensorEventQuery,
        LatestStatusByWorkspaceQuery, MediaQuery, SensorEvent, SensorsByDeviceQuery,
        SensorsByWorkspaceQuery, StreamAggregateQuery, StreamQuery,
    },
    clips::{store, ClipExtractor, FfmpegTrimmer, GsutilStore, RemoteLayout},
    config::Config,
    correlate::{cross_reference, event_anchor, filter_by_minute_window},
    export::{write_rows, EventReportRow, MediaReportRow},
    status::summarize,
    timeutil::{TimeRange, TimeRangeSpec},
    VERSION,
};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensorclip")]
#[command(version = VERSION)]
#[command(about = "Data API query tool with event clip extraction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Time-range selection shared by the query commands.
#[derive(Args, Debug, Clone)]
struct TimeRangeArgs {
    /// Start time (RFC 3339 or `YYYY-MM-DDTHH:MM:SS`, taken as UTC)
    #[arg(long)]
    start_time: Option<String>,

    /// End time; defaults to now
    #[arg(long)]
    end_time: Option<String>,

    /// Minutes before the end time to query
    #[arg(long)]
    last_minutes: Option<i64>,

    /// Hours before the end time to query
    #[arg(long)]
    last_hours: Option<i64>,

    /// Days before the end time to query
    #[arg(long)]
    last_days: Option<i64>,
}

impl TimeRangeArgs {
    fn resolve(&self) -> Result<TimeRange, Box<dyn Error>> {
        let spec = TimeRangeSpec {
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            last_minutes: self.last_minutes,
            last_hours: self.last_hours,
            last_days: self.last_days,
        };
        Ok(spec.resolve(Utc::now())?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Query events, with optional filtering, cross-referencing, CSV
    /// export, and video clip extraction
    Events {
        /// Device ID (BAI_XXXXXXX); also used to locate raw video
        #[arg(long)]
        device_id: Option<String>,

        /// Stream ID to query instead of a device ID
        #[arg(long)]
        stream_id: Option<String>,

        /// Comma separated list of sensors to query
        #[arg(long)]
        sensors: String,

        #[command(flatten)]
        range: TimeRangeArgs,

        /// Keep only events in the first N minutes of each interval
        /// (used with --filter-minutes-modulo)
        #[arg(long)]
        filter_minutes_restrict: Option<u32>,

        /// Interval length in minutes for the minute filter
        #[arg(long)]
        filter_minutes_modulo: Option<u32>,

        /// Sensor to cross reference events against
        #[arg(long)]
        cross_reference_sensor: Option<String>,

        /// Download trimmed video clips of the events
        #[arg(long)]
        download_event_clips: bool,

        /// Directory for downloaded clips
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Remote path to search for raw video, `<bucket>/pathTo/deviceDirs/`
        #[arg(long)]
        source_path: Option<String>,

        /// Remote path to upload trimmed clips to, `<bucket>/pathTo/dir/`
        #[arg(long)]
        upload_event_clips: Option<String>,

        /// CSV file to write event information to
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Find the recorded media item closest to each qualifying event
    Media {
        /// Stream ID (use the device ID for DNNCams)
        #[arg(long)]
        stream_id: String,

        /// Comma separated list of sensors, `<streamUUID>__<sensorName>`
        #[arg(long)]
        sensors: String,

        /// Number of events to show/save
        #[arg(long, short, default_value = "10")]
        num_events: usize,

        /// Days of history to search
        #[arg(long, default_value = "7")]
        days: i64,

        /// Minimum on-time in seconds for an event to qualify
        #[arg(long, short, default_value = "1.5")]
        min_time_on: f64,

        /// Save media files to <output>/<eventId>.mp4
        #[arg(long, short)]
        download: bool,

        /// Directory for downloaded media
        #[arg(long, default_value = "tmp")]
        output: PathBuf,

        /// CSV file to write to
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Scan sensors for the peak object count and list media around it
    Objects {
        /// Stream ID to scan
        #[arg(long)]
        stream_id: String,

        /// Comma separated list of sensors to scan
        #[arg(long)]
        sensors: String,

        /// Days of history to scan
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Query aggregated stream data, or sweep a whole workspace into
    /// per-device CSV reports
    Aggregate {
        #[arg(long)]
        device_id: Option<String>,

        #[arg(long)]
        stream_id: Option<String>,

        /// Comma separated list of sensors to aggregate
        #[arg(long)]
        sensors: Option<String>,

        /// Run a COUNT aggregate over every sensor of every device in the
        /// workspace and write one <deviceId>-sensors.csv per device
        #[arg(long)]
        workspace_id: Option<String>,

        #[command(flatten)]
        range: TimeRangeArgs,

        /// Aggregation window, e.g. 1h
        #[arg(long, default_value = "1h")]
        interval: String,

        /// Comma separated aggregation functions, e.g. sum,avg
        #[arg(long, default_value = "sum")]
        functions: String,

        /// Emit empty aggregation windows
        #[arg(long)]
        fill_empty_windows: bool,
    },

    /// Show the latest event for one sensor on a stream
    Latest {
        #[arg(long)]
        stream_id: String,

        #[arg(long)]
        sensor_id: String,
    },

    /// List sensors active in a workspace or on a device
    Sensors {
        #[arg(long)]
        workspace_id: Option<String>,

        #[arg(long)]
        device_id: Option<String>,

        #[command(flatten)]
        range: TimeRangeArgs,
    },

    /// Summarize service and storage status for a workspace's devices
    Status {
        #[arg(long, short)]
        workspace_id: String,

        /// JSON file with a list of device IDs to restrict the report to
        #[arg(long, short)]
        device_list: Option<PathBuf>,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Events {
            device_id,
            stream_id,
            sensors,
            range,
            filter_minutes_restrict,
            filter_minutes_modulo,
            cross_reference_sensor,
            download_event_clips,
            output,
            source_path,
            upload_event_clips,
            csv,
        } => cmd_events(EventsArgs {
            device_id,
            stream_id,
            sensors,
            range,
            filter_minutes_restrict,
            filter_minutes_modulo,
            cross_reference_sensor,
            download_event_clips,
            output,
            source_path,
            upload_event_clips,
            csv,
        }),
        Commands::Media {
            stream_id,
            sensors,
            num_events,
            days,
            min_time_on,
            download,
            output,
            csv,
        } => cmd_media(
            &stream_id,
            &sensors,
            num_events,
            days,
            min_time_on,
            download,
            &output,
            csv.as_deref(),
        ),
        Commands::Objects {
            stream_id,
            sensors,
            days,
        } => cmd_objects(&stream_id, &sensors, days),
        Commands::Aggregate {
            device_id,
            stream_id,
            sensors,
            workspace_id,
            range,
            interval,
            functions,
            fill_empty_windows,
        } => cmd_aggregate(
            device_id,
            stream_id,
            sensors,
            workspace_id,
            &range,
            &interval,
            &functions,
            fill_empty_windows,
        ),
        Commands::Latest {
            stream_id,
            sensor_id,
        } => cmd_latest(&stream_id, &sensor_id),
        Commands::Sensors {
            workspace_id,
            device_id,
            range,
        } => cmd_sensors(workspace_id, device_id, &range),
        Commands::Status {
            workspace_id,
            device_list,
        } => cmd_status(&workspace_id, device_list.as_deref()),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn make_client() -> Result<BlockingDataApiClient, Box<dyn Error>> {
    let config = Config::load()?;
    let api_key = config.require_api_key()?;
    Ok(BlockingDataApiClient::new(api_key, config.api_base.clone())?)
}

fn split_sensors(sensors: &str) -> Vec<String> {
    sensors
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

struct EventsArgs {
    device_id: Option<String>,
    stream_id: Option<String>,
    sensors: String,
    range: TimeRangeArgs,
    filter_minutes_restrict: Option<u32>,
    filter_minutes_modulo: Option<u32>,
    cross_reference_sensor: Option<String>,
    download_event_clips: bool,
    output: Option<PathBuf>,
    source_path: Option<String>,
    upload_event_clips: Option<String>,
    csv: Option<PathBuf>,
}

fn stream_query(
    device_id: &Option<String>,
    stream_id: &Option<String>,
    sensors: Vec<String>,
    range: TimeRange,
) -> Result<StreamQuery, Box<dyn Error>> {
    match (device_id, stream_id) {
        (Some(device), _) => Ok(StreamQuery::for_device(
            device.clone(),
            sensors,
            range.start,
            range.end,
        )),
        (None, Some(stream)) => Ok(StreamQuery::new(
            stream.clone(),
            sensors,
            range.start,
            range.end,
        )),
        (None, None) => Err("pass --device-id or --stream-id".into()),
    }
}

fn cmd_events(args: EventsArgs) -> Result<(), Box<dyn Error>> {
    let client = make_client()?;
    let range = args.range.resolve()?;

    let query = stream_query(
        &args.device_id,
        &args.stream_id,
        split_sensors(&args.sensors),
        range,
    )?;
    let events = client.query_stream_flat(&query)?;
    println!("Found {} event(s).", events.len());

    let filtered = match (args.filter_minutes_modulo, args.filter_minutes_restrict) {
        (Some(modulo), Some(restrict)) => {
            println!(
                "Events filtered to the first {restrict} minute(s) of each {modulo} minute interval"
            );
            filter_by_minute_window(events, modulo, restrict)
        }
        _ => events,
    };

    if filtered.is_empty() {
        println!("No events matching filters.");
        return Ok(());
    }

    for event in &filtered {
        println!("{}", serde_json::to_string_pretty(event)?);
    }

    // Cross-reference each event against the closest event of another sensor
    let cross_events = match &args.cross_reference_sensor {
        Some(sensor) => {
            println!("Cross referencing {} events with {sensor}", args.sensors);
            let cross_query = stream_query(
                &args.device_id,
                &args.stream_id,
                vec![sensor.clone()],
                range,
            )?;
            Some(client.query_stream_flat(&cross_query)?)
        }
        None => None,
    };

    let mut rows = Vec::with_capacity(filtered.len());
    for event in &filtered {
        let cross = match (&cross_events, event_anchor(event)) {
            (Some(candidates), Ok(anchor)) => cross_reference(anchor, candidates),
            (Some(_), Err(e)) => {
                eprintln!("Skipping cross reference: {e}");
                None
            }
            (None, _) => None,
        };
        if let Some(ref closest) = cross {
            println!(
                "Event {} closest {} event: {} ({})",
                event.id,
                args.cross_reference_sensor.as_deref().unwrap_or(""),
                closest.item.id,
                closest.offset_display()
            );
        }
        rows.push(EventReportRow::new(event, cross.as_ref()));
    }

    if args.download_event_clips {
        let output = args
            .output
            .ok_or("must pass --output with --download-event-clips")?;
        let device_id = args
            .device_id
            .as_deref()
            .ok_or("clip download requires --device-id to locate raw video")?;

        let layout = match &args.source_path {
            Some(source) => RemoteLayout::from_source_path(source),
            None => RemoteLayout::standard(),
        };
        let extractor = ClipExtractor::new(
            Box::new(GsutilStore::new(layout)),
            Box::new(FfmpegTrimmer::new()),
            output,
        );

        let mut downloaded = Vec::new();
        for event in &filtered {
            print!("Searching for video for event {}... ", event.id);
            match extractor.extract(device_id, event) {
                Ok(Some(path)) => {
                    println!("Found!");
                    println!("Downloaded {}", path.display());
                    downloaded.push(path);
                }
                Ok(None) => println!("No luck."),
                Err(e) => {
                    println!();
                    eprintln!("Skipping event {}: {e}", event.id);
                }
            }
        }
        extractor.cleanup()?;

        if let Some(remote) = &args.upload_event_clips {
            println!("Uploading {} clip(s) to {remote}", downloaded.len());
            let uploaded = extractor.upload_clips(&downloaded, remote)?;
            let urls: HashMap<String, String> = uploaded
                .into_iter()
                .filter_map(|(path, url)| {
                    path.file_stem()
                        .map(|stem| (stem.to_string_lossy().to_string(), url))
                })
                .collect();
            rows = rows
                .into_iter()
                .map(|row| match urls.get(&row.event_id) {
                    Some(url) => row.with_clip_url(url.clone()),
                    None => row,
                })
                .collect();
        }
    }

    if let Some(csv_path) = &args.csv {
        print!("Writing to CSV file at {}... ", csv_path.display());
        write_rows(csv_path, &rows)?;
        println!("Done!");
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_media(
    stream_id: &str,
    sensors: &str,
    num_events: usize,
    days: i64,
    min_time_on: f64,
    download: bool,
    output: &PathBuf,
    csv: Option<&std::path::Path>,
) -> Result<(), Box<dyn Error>> {
    let client = make_client()?;
    let end = Utc::now();
    let start = end - Duration::days(days);

    let events = client.query_stream_flat(&StreamQuery::new(
        stream_id,
        split_sensors(sensors),
        start,
        end,
    ))?;
    println!("Found {} event(s) in the last {days} day(s).", events.len());

    let mut rows = Vec::new();
    let mut shown = 0usize;
    for event in &events {
        // Filter out blips shorter than the on-time threshold
        if matches!(event.meta.time_on, Some(time_on) if time_on <= min_time_on) {
            continue;
        }
        let time_of_interest = match event.collected_at() {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Skipping event: {e}");
                continue;
            }
        };

        // Media items cover the event start, so look from the event
        // instant up to a minute after it
        let results = client.query_media(&MediaQuery::new(
            stream_id,
            time_of_interest,
            time_of_interest + Duration::minutes(1),
        ))?;

        let closest = sensorclip::correlate::closest_event(time_of_interest, &results, |m| {
            m.collected_at().ok()
        });

        let Some(closest) = closest else {
            continue;
        };
        shown += 1;

        println!("Found media event for event {}.", event.id);
        println!("{}", serde_json::to_string_pretty(closest.item)?);

        rows.push(MediaReportRow::new(event, closest.item));

        if download {
            std::fs::create_dir_all(output)?;
            let dest = output.join(format!("{}.mp4", event.id));
            if !dest.exists() {
                println!("Downloading {} to {}", closest.item.url, dest.display());
                store::download_url(&closest.item.url, &dest)?;
            }
        }

        if shown == num_events {
            break;
        }
    }

    if let Some(csv_path) = csv {
        print!("Writing to CSV file at {}... ", csv_path.display());
        write_rows(csv_path, &rows)?;
        println!("Done!");
    }

    Ok(())
}

fn cmd_objects(stream_id: &str, sensors: &str, days: i64) -> Result<(), Box<dyn Error>> {
    let client = make_client()?;
    let end = Utc::now();
    let start = end - Duration::days(days);

    let mut global_max: Option<SensorEvent> = None;
    for sensor in split_sensors(sensors) {
        let events = client.query_stream_flat(
            &StreamQuery::new(stream_id, vec![sensor.clone()], start, end)
                .with_in_progress(InProgressEvents::Only),
        )?;
        println!("{sensor}: {} event(s)", events.len());

        // First event at the maximum wins
        let local_max = events.iter().fold(None::<&SensorEvent>, |best, event| match best {
            Some(current) if event.objects_in_region() <= current.objects_in_region() => {
                Some(current)
            }
            _ => Some(event),
        });
        let Some(local_max) = local_max else {
            continue;
        };
        println!(
            "{sensor}: max {} object(s) @ {}",
            local_max.objects_in_region(),
            local_max.time_collected
        );

        let beats_global = global_max
            .as_ref()
            .map(|current| local_max.objects_in_region() > current.objects_in_region())
            .unwrap_or(true);
        if beats_global {
            global_max = Some(local_max.clone());
        }
    }

    let Some(peak) = global_max else {
        println!("No events found.");
        return Ok(());
    };
    println!(
        "Global max: {} object(s) @ {}",
        peak.objects_in_region(),
        peak.time_collected
    );

    let time_of_interest = peak.collected_at()?;
    let media = client.query_media(&MediaQuery::new(
        peak.stream_id.as_deref().unwrap_or(stream_id),
        time_of_interest - Duration::hours(6),
        time_of_interest,
    ))?;
    for item in media {
        println!("{}", serde_json::to_string_pretty(&item)?);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_aggregate(
    device_id: Option<String>,
    stream_id: Option<String>,
    sensors: Option<String>,
    workspace_id: Option<String>,
    range: &TimeRangeArgs,
    interval: &str,
    functions: &str,
    fill_empty_windows: bool,
) -> Result<(), Box<dyn Error>> {
    let client = make_client()?;
    let range = range.resolve()?;

    if let Some(workspace) = workspace_id {
        return aggregate_workspace(&client, &workspace, range, interval);
    }

    let sensors = sensors.ok_or("pass --sensors (or --workspace-id for a workspace sweep)")?;
    if device_id.is_none() && stream_id.is_none() {
        return Err("pass --device-id, --stream-id or --workspace-id".into());
    }

    let query = StreamAggregateQuery {
        stream_id,
        device_id,
        sensors: split_sensors(&sensors),
        start_time: range.start,
        end_time: range.end,
        interval: interval.to_string(),
        functions: split_sensors(functions),
        fill_empty_windows,
        order: None,
    };
    let rows = client.query_stream_aggregate(&query)?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    println!("Response length => {}", rows.len());
    Ok(())
}

fn aggregate_workspace(
    client: &BlockingDataApiClient,
    workspace_id: &str,
    range: TimeRange,
    interval: &str,
) -> Result<(), Box<dyn Error>> {
    let sensors = client.sensors_by_workspace(&SensorsByWorkspaceQuery {
        workspace_id: workspace_id.to_string(),
        start_time: range.start,
        end_time: range.end,
    })?;
    let devices = device_sensor_map(&sensors);
    if devices.is_empty() {
        println!("No sensors found in workspace {workspace_id}.");
        return Ok(());
    }

    for (device, names) in &devices {
        let names: Vec<String> = names.iter().cloned().collect();
        println!("Found device {device} with sensors {}", names.join(", "));

        let query = StreamAggregateQuery {
            stream_id: None,
            device_id: Some(device.clone()),
            sensors: names,
            start_time: range.start,
            end_time: range.end,
            interval: interval.to_string(),
            functions: vec!["COUNT".to_string()],
            fill_empty_windows: true,
            order: Some("ASCENDING".to_string()),
        };
        let windows = client.query_stream_aggregate_windows(&query)?;
        let report = build_report(&windows);

        let path = PathBuf::from(format!("{device}-sensors.csv"));
        write_report_csv(&path, &report)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_latest(stream_id: &str, sensor_id: &str) -> Result<(), Box<dyn Error>> {
    let client = make_client()?;
    let event = client.latest_stream_event(&LatestSensorEventQuery {
        stream_id: stream_id.to_string(),
        sensor_id: sensor_id.to_string(),
    })?;
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

fn cmd_sensors(
    workspace_id: Option<String>,
    device_id: Option<String>,
    range: &TimeRangeArgs,
) -> Result<(), Box<dyn Error>> {
    let client = make_client()?;
    let range = range.resolve()?;

    let sensors = match (workspace_id, device_id) {
        (Some(workspace), _) => client.sensors_by_workspace(&SensorsByWorkspaceQuery {
            workspace_id: workspace,
            start_time: range.start,
            end_time: range.end,
        })?,
        (None, Some(device)) => client.sensors_by_device(&SensorsByDeviceQuery {
            device_id: device,
            start_time: range.start,
            end_time: range.end,
        })?,
        (None, None) => return Err("pass --workspace-id or --device-id".into()),
    };

    for sensor in &sensors {
        println!("{}", serde_json::to_string(sensor)?);
    }
    println!("{} sensor(s)", sensors.len());
    Ok(())
}

fn cmd_status(
    workspace_id: &str,
    device_list: Option<&std::path::Path>,
) -> Result<(), Box<dyn Error>> {
    let client = make_client()?;
    let devices = client.status_by_workspace(&LatestStatusByWorkspaceQuery {
        workspace_id: workspace_id.to_string(),
    })?;

    let allowlist: Option<HashSet<String>> = match device_list {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Some(serde_json::from_str(&content)?)
        }
        None => None,
    };

    let report = summarize(&devices, allowlist.as_ref());
    print!("{report}");
    Ok(())
}

fn cmd_config() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    println!("Configuration file: {}", Config::config_path().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
