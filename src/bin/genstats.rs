use covidstats::{
	county_stats, create_output, derive_test_stats, drop_zero_counties, fips_by_county,
	load_population, load_regions, load_tracking_csv, load_wide_csv, magic_open,
	merged_county_backfill, nation_stats, region_stats, state_stats, trim_zero_prefix,
	unroll, write_stats, ProgressMeter, ProgressSink, StatWindows,
};


struct Config {
	cases: String,
	population: String,
	regions: String,
	tracking: String,
	outdir: String,
	county_trends: bool,
	unmerge_counties: bool,
}

fn parse_args() -> Option<Config> {
	let mut county_trends = false;
	let mut unmerge_counties = false;
	let mut positional = Vec::new();
	for arg in std::env::args().skip(1) {
		match &arg[..] {
			"--county-trends" => county_trends = true,
			"--unmerge-counties" => unmerge_counties = true,
			_ => positional.push(arg),
		}
	}
	if positional.len() != 5 {
		return None
	}
	let mut it = positional.into_iter();
	Some(Config{
		cases: it.next()?,
		population: it.next()?,
		regions: it.next()?,
		tracking: it.next()?,
		outdir: it.next()?,
		county_trends,
		unmerge_counties,
	})
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();
	let cfg = match parse_args() {
		Some(cfg) => cfg,
		None => {
			eprintln!("usage: genstats [--county-trends] [--unmerge-counties] <cases.csv[.gz]> <population.csv> <regions.csv> <tracking.csv[.gz]> <outdir>");
			std::process::exit(2);
		},
	};

	println!("loading reference data ...");
	let population = {
		let mut r = magic_open(&cfg.population)?;
		load_population(&mut r)?
	};
	let regions = {
		let mut r = magic_open(&cfg.regions)?;
		load_regions(&mut r)?
	};

	println!("loading case data ...");
	let mut wide = {
		let mut r = magic_open(&cfg.cases)?;
		load_wide_csv(&mut r)?
	};
	let trimmed = trim_zero_prefix(&mut wide);
	if trimmed > 0 {
		println!("trimmed {} case-free leading days", trimmed);
	}
	let dropped = drop_zero_counties(&mut wide);
	if dropped > 0 {
		println!("dropped {} folded-away counties", dropped);
	}
	let fips = fips_by_county(&wide);
	let counters = unroll(&wide)?;
	println!("unrolled {} units over {} days", counters.num_keys(), counters.len());

	println!("loading test count data ...");
	let test_counts = {
		let mut r = magic_open(&cfg.tracking)?;
		load_tracking_csv(&mut r)?
	};
	let windows = StatWindows::default();
	let state_tests = derive_test_stats(&test_counts, windows.avg_days);
	let nation_tests = derive_test_stats(&test_counts.nation(), windows.avg_days);

	println!("deriving county statistics ...");
	let mut counties = if cfg.county_trends {
		let n = counters.num_keys();
		let mut pm = ProgressMeter::start(Some(n));
		let table = county_stats(&counters, &population, windows, true, Some(&mut pm));
		pm.finish(Some(n));
		table
	} else {
		county_stats(&counters, &population, windows, false, None)
	};
	if cfg.unmerge_counties {
		let copied = merged_county_backfill(&mut counties);
		println!("backfilled {} merged county series", copied);
	}

	println!("deriving region statistics ...");
	let region_table = region_stats(&counters, &population, &regions, windows);
	println!("deriving state statistics ...");
	let state_table = state_stats(&counters, &population, windows);
	println!("deriving national statistics ...");
	let nation_table = nation_stats(&counters, &population, windows);

	println!("writing tables to {} ...", cfg.outdir);
	write_stats(create_output(&cfg.outdir, "counties.csv")?, &counties, Some(&fips), Some(&regions), None, false)?;
	write_stats(create_output(&cfg.outdir, "regions.csv")?, &region_table, None, None, None, false)?;
	write_stats(create_output(&cfg.outdir, "states.csv")?, &state_table, None, None, Some(&state_tests), false)?;
	write_stats(create_output(&cfg.outdir, "us.csv")?, &nation_table, None, None, Some(&nation_tests), false)?;

	Ok(())
}
