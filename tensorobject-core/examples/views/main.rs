use tensorobject_core::{DType, Device, TensorObject};

fn main() {
    let data: Vec<f32> = (0..24).map(|x| x as f32).collect();
    let t = TensorObject::from_vec(data, &[6, 4], &Device::Cpu).unwrap();
    dbg!(&t);

    // Middle two columns of every row: a view, no copy.
    let cols = t.slice(&[0, 1], &[-1, 3]).unwrap();
    dbg!(&cols, cols.is_compact(), cols.shares_storage(&t));

    // Rows 0..2 and 4..6, gathered into a dense block.
    let rows = cols.copy_rows(&[(0, 2), (4, 6)], 4).unwrap();
    dbg!(&rows, rows.to_vec::<f32>().unwrap());

    let ints = rows.reshape(&[8]).unwrap().as_type(DType::I32).unwrap();
    dbg!(ints.to_vec::<i32>().unwrap());

    // Writes through one handle are seen by its clones.
    let alias = t.clone();
    t.copy_from(&TensorObject::zeros(&[6, 4], DType::F32, &Device::Cpu).unwrap())
        .unwrap();
    assert_eq!(alias.read_element::<f32>(&[5, 3]).unwrap(), 0.0);
}
