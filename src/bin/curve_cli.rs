#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    bezier_engine::init_logger();
    if let Err(err) = native::run() {
        eprintln!("curve_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use bezier_engine::geom::{
        AdaptivePolicy, BezierCurve, ComputationMethod, ControlPoints, RenderTimingReport,
        TimingBucket, Vec3,
    };
    use bezier_engine::render::{AggregatedFrame, ColorSource, CurveConfiguration, CurveDisplay};
    use std::fmt::Write as _;
    use std::fs;
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"curve_cli (bezier-engine)

USAGE:
  curve_cli list
  curve_cli render [options] [--out <path>] [--overwrite]
  curve_cli length [options] [--policy reference|<nodes>,<depth>,<tolerance>]
  curve_cli bench  [options] [--runs <n>]

OPTIONS:
  --points <x,y,z;...>  Control points (default: a quadratic arch)
  --resolution <n>      Samples per render
  --threads <n>         Worker threads
  --method <name>       polynomial | horner | de-casteljau
  --color <name>        none | direction | curvature | velocity | acceleration | random
  --no-velocity         Disable velocity (and everything that needs it)
  --no-acceleration     Disable acceleration
  --no-curvature        Disable curvature
  --no-size             Disable segment size
  -h, --help            Show this help
"#;

    const DEFAULT_POINTS: [[f64; 3]; 3] = [[-5.0, 3.0, -10.0], [0.0, 7.0, -10.0], [5.0, 3.0, -10.0]];

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_choices();
                Ok(())
            }
            "render" => cmd_render(&mut args),
            "length" => cmd_length(&mut args),
            "bench" => cmd_bench(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_choices() {
        println!("methods:");
        for method in ComputationMethod::ALL {
            println!("  {}", method.name());
        }
        println!("color sources:");
        for source in ColorSource::ALL {
            println!("  {}", source.name());
        }
    }

    /// Options shared by every command.
    struct CurveOptions {
        points: ControlPoints,
        config: CurveConfiguration,
    }

    impl CurveOptions {
        fn new() -> Result<Self, String> {
            let points = DEFAULT_POINTS.iter().map(|p| Vec3::from(*p)).collect::<Vec<_>>();
            Ok(Self {
                points: ControlPoints::new(points).map_err(|e| e.to_string())?,
                config: CurveConfiguration::new(),
            })
        }

        /// Consumes `arg` if it is a shared option; `Ok(false)` otherwise.
        fn accept(&mut self, arg: &str, args: &mut Args) -> Result<bool, String> {
            match arg {
                "--points" => {
                    self.points = parse_points(&args.value("--points")?)?;
                }
                "--resolution" => {
                    self.config.resolution = Some(parse_usize("--resolution", &args.value("--resolution")?)?);
                }
                "--threads" => {
                    self.config.threads = Some(parse_usize("--threads", &args.value("--threads")?)?);
                }
                "--method" => {
                    let name = args.value("--method")?;
                    let method = ComputationMethod::from_name(&name)
                        .ok_or_else(|| format!("unknown method `{name}`"))?;
                    self.config.method = Some(method);
                }
                "--color" => {
                    let name = args.value("--color")?;
                    let source =
                        ColorSource::from_name(&name).ok_or_else(|| format!("unknown color source `{name}`"))?;
                    self.config.color_source = Some(source);
                }
                "--no-velocity" => self.config.velocity = Some(false),
                "--no-acceleration" => self.config.acceleration = Some(false),
                "--no-curvature" => self.config.curvature = Some(false),
                "--no-size" => self.config.size = Some(false),
                _ => return Ok(false),
            }
            Ok(true)
        }

        fn method(&self) -> ComputationMethod {
            self.config.method.unwrap_or_default()
        }
    }

    fn cmd_render(args: &mut Args) -> Result<(), String> {
        let mut options = CurveOptions::new()?;
        let mut out_path: Option<PathBuf> = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            if options.accept(&arg, args)? {
                continue;
            }
            match arg.as_str() {
                "--out" => out_path = Some(PathBuf::from(args.value("--out")?)),
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let mut display = CurveDisplay::new(options.points, &options.config).map_err(|e| e.to_string())?;
        let frame = display.render().map_err(|e| e.to_string())?;
        let config = display.configuration();

        if let Some(path) = out_path.as_deref() {
            write_text_file(path, &frame_csv(&frame), overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", frame_csv(&frame));
        }

        eprintln!(
            "render: samples={} threads={} method={} color={} | {}",
            frame.len(),
            config.threads,
            config.method.name(),
            config.color_source,
            timing_summary(&frame.timings)
        );
        if let Some(max) = frame.max_measured {
            eprintln!("max measured magnitude: {max:.6}");
        }
        Ok(())
    }

    fn cmd_length(args: &mut Args) -> Result<(), String> {
        let mut options = CurveOptions::new()?;
        let mut policy = AdaptivePolicy::REFERENCE;

        while let Some(arg) = args.next() {
            if options.accept(&arg, args)? {
                continue;
            }
            match arg.as_str() {
                "--policy" => policy = parse_policy(&args.value("--policy")?)?,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let method = options.method();
        let curve = BezierCurve::new(options.points, method);
        println!("{:.12}", curve.arc_length(&policy));
        Ok(())
    }

    fn cmd_bench(args: &mut Args) -> Result<(), String> {
        let mut options = CurveOptions::new()?;
        let mut runs = 10_usize;

        while let Some(arg) = args.next() {
            if options.accept(&arg, args)? {
                continue;
            }
            match arg.as_str() {
                "--runs" => runs = parse_usize("--runs", &args.value("--runs")?)?.max(1),
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let methods: Vec<ComputationMethod> = match options.config.method {
            Some(method) => vec![method],
            None => ComputationMethod::ALL.to_vec(),
        };

        for method in methods {
            let config = options.config.with_method(method);
            let mut display =
                CurveDisplay::new(options.points.clone(), &config).map_err(|e| e.to_string())?;
            let mut total = RenderTimingReport::default();
            for _ in 0..runs {
                let frame = display.render().map_err(|e| e.to_string())?;
                total.accumulate(&frame.timings);
            }
            println!(
                "{:<14} runs={runs} avg={:.3} ms | {}",
                method.name(),
                total.total_ms() / runs as f64,
                timing_summary(&total)
            );
        }
        Ok(())
    }

    fn frame_csv(frame: &AggregatedFrame) -> String {
        let mut out = String::from("index,x,y,z,r,g,b,size\n");
        for (index, transform) in frame.destinations.iter().enumerate() {
            let p = transform.translation();
            let _ = write!(out, "{index},{:.6},{:.6},{:.6}", p.x, p.y, p.z);
            match frame.colors.get(index).copied().flatten() {
                Some(c) => {
                    let _ = write!(out, ",{:.6},{:.6},{:.6}", c.r, c.g, c.b);
                }
                None => out.push_str(",,,"),
            }
            match frame.sizes.get(index).copied().flatten() {
                Some(size) => {
                    let _ = writeln!(out, ",{size:.6}");
                }
                None => out.push_str(",\n"),
            }
        }
        out
    }

    fn timing_summary(report: &RenderTimingReport) -> String {
        let mut out = format!("total={:.3}ms", report.total_ms());
        for bucket in TimingBucket::ALL {
            let _ = write!(out, " {}={:.3}ms", bucket.name(), report.bucket_ns(bucket) as f64 / 1e6);
        }
        out
    }

    fn parse_points(text: &str) -> Result<ControlPoints, String> {
        let mut points = Vec::new();
        for (i, chunk) in text.split(';').filter(|c| !c.trim().is_empty()).enumerate() {
            let coords = chunk
                .split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("point {i}: {e}"))?;
            let [x, y, z] = coords[..] else {
                return Err(format!("point {i}: expected 3 coordinates, got {}", coords.len()));
            };
            points.push(Vec3::new(x, y, z));
        }
        ControlPoints::new(points).map_err(|e| e.to_string())
    }

    fn parse_policy(text: &str) -> Result<AdaptivePolicy, String> {
        if text == "reference" {
            return Ok(AdaptivePolicy::REFERENCE);
        }
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let [nodes, depth, tolerance] = parts[..] else {
            return Err(format!("invalid policy `{text}` (expected <nodes>,<depth>,<tolerance>)"));
        };
        Ok(AdaptivePolicy {
            node_count: parse_usize("--policy nodes", nodes)?.max(1),
            max_depth: parse_usize("--policy depth", depth)?,
            tolerance: tolerance
                .parse()
                .map_err(|e| format!("invalid value for --policy tolerance: {e}"))?,
        })
    }

    fn parse_usize(flag: &str, value: &str) -> Result<usize, String> {
        value
            .parse()
            .map_err(|e| format!("invalid value for {flag}: {e}"))
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, text).map_err(|e| format!("write {}: {e}", path.display()))
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }

}
