use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const LAST_NAMES: [&str; 6] = ["Jackson", "Smith", "Fornea", "Nguyen", "Okafor", "Larsen"];
const FIRST_NAMES: [&str; 8] = ["Robert", "Jon", "Susan", "Chris", "Shelly", "Amara", "Lin", "Erik"];
const ZIP_CODES: [i64; 5] = [34471, 34474, 34476, 39401, 32601];

/// Minimal deterministic PRNG (xoshiro256**), kept in-tree so the sample
/// data is reproducible without a `rand` dependency.
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }
}

struct Person {
    last_name: String,
    first_name: String,
    zip_code: i64,
    joined: String,
}

fn main() -> Result<()> {
    let rows: usize = std::env::args()
        .nth(1)
        .map(|n| n.parse())
        .transpose()
        .context("row count must be a number")?
        .unwrap_or(200);

    let mut rng = SimpleRng::new(42);
    let people: Vec<Person> = (0..rows)
        .map(|_| Person {
            last_name: rng.pick(&LAST_NAMES[..]).to_string(),
            first_name: rng.pick(&FIRST_NAMES[..]).to_string(),
            zip_code: *rng.pick(&ZIP_CODES[..]),
            joined: format!(
                "{}-{:02}-{:02}",
                2015 + rng.next_u64() % 10,
                1 + rng.next_u64() % 12,
                1 + rng.next_u64() % 28
            ),
        })
        .collect();

    // Write CSV
    let csv_path = "people.csv";
    let mut writer = csv::Writer::from_path(csv_path).context("creating CSV output")?;
    writer.write_record(["last_name", "first_name", "zip_code", "joined"])?;
    for p in &people {
        let zip = p.zip_code.to_string();
        writer.write_record([
            p.last_name.as_str(),
            p.first_name.as_str(),
            zip.as_str(),
            p.joined.as_str(),
        ])?;
    }
    writer.flush()?;

    // Build Arrow arrays
    let schema = Arc::new(Schema::new(vec![
        Field::new("last_name", DataType::Utf8, false),
        Field::new("first_name", DataType::Utf8, false),
        Field::new("zip_code", DataType::Int64, false),
        Field::new("joined", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(people.iter().map(|p| p.last_name.as_str()))),
            Arc::new(StringArray::from_iter_values(people.iter().map(|p| p.first_name.as_str()))),
            Arc::new(Int64Array::from_iter_values(people.iter().map(|p| p.zip_code))),
            Arc::new(StringArray::from_iter_values(people.iter().map(|p| p.joined.as_str()))),
        ],
    )
    .context("building record batch")?;

    // Write Parquet
    let parquet_path = "people.parquet";
    let file = std::fs::File::create(parquet_path).context("creating parquet output")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;

    println!("Wrote {rows} people to {csv_path} and {parquet_path}");
    Ok(())
}
