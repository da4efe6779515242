use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};

use bucketdb::database::{Database, DatabaseResult};
use bucketdb::file::DEFAULT_POOL_PAGES;
use bucketdb::index::{AccessPredicate, DEFAULT_BUCKETS};
use bucketdb::record::{DbFileIterator, Op, Tuple, TupleDesc};

#[derive(Parser)]
#[command(author, version, about = "bucketdb - heap tables with static hash indexes")]
struct Cli {
    /// Directory holding the catalog and data files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Buffer pool size (number of pages)
    #[arg(short, long, default_value_t = DEFAULT_POOL_PAGES)]
    pool_pages: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a database from a text schema file
    Init {
        /// One table per line: `name (field type, ...)`
        schema: PathBuf,
    },

    /// Insert the rows of a header-less CSV file into a table
    Load { table: String, csv: PathBuf },

    /// Print every row of a table
    Scan { table: String },

    /// Build a hash index on one field of a table
    CreateIndex {
        name: String,
        table: String,
        field: String,

        /// Number of primary bucket pages
        #[arg(short, long, default_value_t = DEFAULT_BUCKETS)]
        buckets: usize,
    },

    /// Print the rows whose indexed key satisfies `<op> <value>`
    Search {
        index: String,
        /// One of =, <>, >, >=, <, <=, like
        op: Op,
        value: String,
    },

    /// Print the chain shape of every non-empty bucket of an index
    Stats { index: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> DatabaseResult<()> {
    match cli.command {
        Commands::Init { schema } => {
            let mut db = Database::create(&cli.data_dir, cli.pool_pages)?;
            let tables = db.load_schema(&schema)?;
            println!(
                "Created database in {} with tables: {}",
                cli.data_dir.display(),
                tables.join(", ")
            );
            db.close()
        }
        Commands::Load { table, csv } => {
            let mut db = Database::open(&cli.data_dir, cli.pool_pages)?;
            let rows = db.load_csv(&table, &csv)?;
            println!("Loaded {} rows into {}", rows, table);
            db.close()
        }
        Commands::Scan { table } => {
            let db = Database::open(&cli.data_dir, cli.pool_pages)?;
            let desc = db.schema(&table)?;
            let mut scan = db.scan(&table)?;
            scan.open()?;
            let mut rows = Vec::new();
            while scan.has_next()? {
                rows.push(scan.next()?);
            }
            scan.close();
            print_tuples(&desc, &rows);
            db.close()
        }
        Commands::CreateIndex {
            name,
            table,
            field,
            buckets,
        } => {
            let mut db = Database::open(&cli.data_dir, cli.pool_pages)?;
            db.create_index(&name, &table, &field, buckets)?;
            println!("Created index {} on {}.{} with {} buckets", name, table, field, buckets);
            db.close()
        }
        Commands::Search { index, op, value } => {
            let db = Database::open(&cli.data_dir, cli.pool_pages)?;
            let operand = db.index_key_type(&index)?.parse_field(&value)?;
            let pred = AccessPredicate::new(op, operand);
            let rows = db.index_search(&index, &pred)?;
            if let Some(first) = rows.first() {
                print_tuples(first.desc(), &rows);
            } else {
                println!("(0 rows)");
            }
            db.close()
        }
        Commands::Stats { index } => {
            let db = Database::open(&cli.data_dir, cli.pool_pages)?;
            let stats = db.bucket_stats(&index)?;

            let mut table = Table::new();
            table.set_titles(Row::new(vec![
                Cell::new("bucket"),
                Cell::new("entries"),
                Cell::new("pages"),
            ]));
            for bucket in stats.iter().filter(|s| s.entries > 0 || s.pages > 1) {
                table.add_row(Row::new(vec![
                    Cell::new(&bucket.bucket.to_string()),
                    Cell::new(&bucket.entries.to_string()),
                    Cell::new(&bucket.pages.to_string()),
                ]));
            }
            table.printstd();

            let entries: usize = stats.iter().map(|s| s.entries).sum();
            let longest = stats.iter().map(|s| s.pages).max().unwrap_or(0);
            println!(
                "{} entries in {} buckets, longest chain {} pages",
                entries,
                stats.len(),
                longest
            );
            db.close()
        }
    }
}

fn print_tuples(desc: &TupleDesc, rows: &[Tuple]) {
    let mut table = Table::new();
    let titles = (0..desc.num_fields())
        .map(|i| match desc.field_name(i) {
            Ok(Some(name)) => Cell::new(name),
            _ => Cell::new(&format!("f{}", i)),
        })
        .collect();
    table.set_titles(Row::new(titles));

    for tuple in rows {
        let cells = tuple
            .fields()
            .iter()
            .map(|field| Cell::new(&field.to_string()))
            .collect();
        table.add_row(Row::new(cells));
    }

    table.printstd();
    println!("({} rows)", rows.len());
}
