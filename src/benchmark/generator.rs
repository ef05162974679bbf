use rand::{rngs::StdRng, Rng, SeedableRng};
use tabula::{FieldDef, FieldType, ModelDef, Value};

pub const AGE: usize = 1;
pub const SCORE: usize = 2;
pub const CITY: usize = 3;

const MAX_AGE: i64 = 100;
const CITIES: i64 = 50;

pub struct Generator {
    rng: StdRng,
    model: ModelDef,
    written: u64,
}

impl Generator {
    pub fn new(seed: u64) -> Self {
        let model = ModelDef::new(
            "person",
            vec![
                FieldDef::new("name", FieldType::String(16)),
                FieldDef::new("age", FieldType::Int).indexed(),
                FieldDef::new("score", FieldType::Double),
                FieldDef::new("city", FieldType::Int),
            ],
        )
        .unwrap_or_else(|e| panic!("benchmark model is invalid: {}", e));
        Self {
            rng: StdRng::seed_from_u64(seed),
            model,
            written: 0,
        }
    }

    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    pub fn age(&mut self) -> i64 {
        self.rng.gen_range(0..MAX_AGE)
    }

    pub fn next_row(&mut self) -> Vec<Value> {
        self.written += 1;
        vec![
            Value::from(format!("person{}", self.written)),
            Value::Int(self.age()),
            Value::Double(self.rng.gen_range(0.0..1000.0)),
            Value::Int(self.rng.gen_range(0..CITIES)),
        ]
    }
}
